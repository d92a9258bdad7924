//! Playback scheduler: replays a source's frame stream against wall-clock
//! deadlines.
//!
//! For every frame the player draws into the back buffer, swaps on vsync,
//! measures how long the swap blocked, and sleeps only for what is left of
//! the frame's delay. Time spent waiting for the panel is therefore never
//! added on top of the intended delay, and the average frame rate follows
//! the source even when swap latency jitters. When a swap alone takes longer
//! than the delay, the sleep is skipped; it never goes negative.
//!
//! One `play` call runs until the loop budget is spent, the duration cap
//! passes, or the cancellation token trips. The token is polled before every
//! frame and every loop, never inside a swap or sleep, so a stop request
//! takes effect after at most one more frame.
//!
//! ## Rust concepts
//! - Generic over a `Clock` trait so tests can drive time by hand
//! - Labeled `loop` with `break value` to return the stop reason

use crate::CancellationToken;
use crate::display::DisplaySurface;
use crate::error::PlaybackError;
use crate::frame::FrameBuffer;
use crate::source::Source;
use std::thread;
use std::time::{Duration, Instant};

/// Slow frames logged individually per `play` call before going quiet.
const SLOW_FRAME_LOG_LIMIT: u32 = 5;

// ── Time ─────────────────────────────────────────────────────────────

/// Monotonic time source for the scheduler.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Real time: `Instant` for reading, `thread::sleep` for waiting.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Time left to sleep after a swap that took `elapsed` out of `delay`.
pub fn compensated_delay(delay: Duration, elapsed: Duration) -> Duration {
    delay.saturating_sub(elapsed)
}

// ── Reports ──────────────────────────────────────────────────────────

/// Why a `play` call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of loops was played.
    LoopsExhausted,
    /// The animation duration cap (or still image wait) passed.
    DeadlineReached,
    Cancelled,
    /// A full pass over the stream produced no frame.
    EmptyStream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    pub frames_shown: u64,
    pub loops_completed: u32,
    pub stop: StopReason,
}

// ── Player ───────────────────────────────────────────────────────────

pub struct Player<'a, D: DisplaySurface, C: Clock> {
    display: &'a mut D,
    clock: C,
    cancel: CancellationToken,
    /// Reused for every frame of every source.
    frame: FrameBuffer,
}

impl<'a, D: DisplaySurface, C: Clock> Player<'a, D, C> {
    pub fn new(display: &'a mut D, clock: C, cancel: CancellationToken) -> Self {
        let frame = FrameBuffer::new(display.width(), display.height());
        Self {
            display,
            clock,
            cancel,
            frame,
        }
    }

    /// Play one source from its first frame until a stop condition holds.
    pub fn play(&mut self, source: &mut Source) -> Result<PlaybackReport, PlaybackError> {
        let params = source.params;
        let cap = if source.is_multi_frame {
            params.anim_duration
        } else {
            Some(params.wait)
        };
        let end = cap.and_then(|cap| self.clock.now().checked_add(cap));

        tracing::debug!(
            "Playing {} (multi-frame: {}, cap: {:?}, loops: {:?})",
            source.name,
            source.is_multi_frame,
            cap,
            params.loops
        );

        let stream = &mut source.stream;
        stream.rewind();

        let mut frames_shown = 0u64;
        let mut loops_completed = 0u32;
        let mut slow_frames = 0u32;

        let stop = 'playback: loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if params.loops.is_some_and(|loops| loops_completed >= loops) {
                break StopReason::LoopsExhausted;
            }
            if end.is_some_and(|end| self.clock.now() >= end) {
                break StopReason::DeadlineReached;
            }

            let mut shown_this_loop = 0u64;
            loop {
                if self.cancel.is_cancelled() || end.is_some_and(|end| self.clock.now() > end) {
                    // Interrupted mid-pass; the outer checks pick the reason.
                    stream.rewind();
                    continue 'playback;
                }
                let Some(delay_us) = stream.read_next(&mut self.frame)? else {
                    break;
                };
                let delay = params
                    .anim_delay_override
                    .unwrap_or(Duration::from_micros(delay_us.into()));

                self.display.draw_frame(&self.frame);
                let swap_start = self.clock.now();
                self.display.swap(params.vsync_multiple);
                let swap_time = self.clock.now().saturating_sub(swap_start);

                let remaining = compensated_delay(delay, swap_time);
                if !remaining.is_zero() {
                    self.clock.sleep(remaining);
                } else if swap_time > delay {
                    slow_frames += 1;
                    if slow_frames <= SLOW_FRAME_LOG_LIMIT {
                        tracing::warn!(
                            "{}: frame {} swap took {}µs (target: {}µs)",
                            source.name,
                            shown_this_loop,
                            swap_time.as_micros(),
                            delay.as_micros()
                        );
                    }
                }

                shown_this_loop += 1;
                frames_shown += 1;
            }

            stream.rewind();
            if shown_this_loop == 0 {
                break StopReason::EmptyStream;
            }
            loops_completed += 1;
            tracing::debug!("{}: loop {} done", source.name, loops_completed);
        };

        if slow_frames > SLOW_FRAME_LOG_LIMIT {
            tracing::warn!(
                "{}: {} slow frames out of {}",
                source.name,
                slow_frames,
                frames_shown
            );
        }

        Ok(PlaybackReport {
            frames_shown,
            loops_completed,
            stop,
        })
    }

    /// Play every source in order, skipping the ones that fail.
    ///
    /// With `repeat`, the list starts over until cancelled. A pass in which
    /// no source shows a single frame ends the run instead of spinning.
    pub fn play_all(&mut self, sources: &mut [Source], repeat: bool) {
        loop {
            let mut shown_in_pass = 0u64;
            for source in sources.iter_mut() {
                if self.cancel.is_cancelled() {
                    return;
                }
                match self.play(source) {
                    Ok(report) => {
                        tracing::debug!("{}: {:?}", source.name, report);
                        shown_in_pass += report.frames_shown;
                    }
                    Err(e) => tracing::warn!("{} skipped: playback failed ({})", source.name, e),
                }
            }

            if !repeat || self.cancel.is_cancelled() {
                return;
            }
            if shown_in_pass == 0 {
                tracing::error!("No source showed any frame; stopping playback");
                return;
            }
        }
    }
}
