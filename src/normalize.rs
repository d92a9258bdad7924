//! Source normalizer: decoded image or animation → scaled, self-contained
//! frames with per-frame display durations, written into a frame stream.
//!
//! Decoding is delegated to the `image` crate. From there on:
//! 1. animations are coalesced, so every frame is a full picture rather than
//!    an incremental update over the previous one;
//! 2. every frame is scaled to one common size chosen by [`scaled_dimensions`];
//! 3. each frame is drawn into a panel-sized [`FrameBuffer`] and stored with
//!    its delay ([`store_sequence`]).
//!
//! ## Rust concepts
//! - `image::AnimationDecoder` for GIF / APNG / WebP frame iteration
//! - `let ... else` for early returns

use crate::error::{LoadError, StreamError};
use crate::frame::FrameBuffer;
use crate::params::PlaybackParams;
use crate::stream::FrameStream;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Frame, ImageFormat, ImageReader, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Delay used whenever a frame would otherwise have none (1/10 s).
pub const DEFAULT_FRAME_DELAY_US: u32 = 100_000;

/// One frame as the decoder produced it.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    pub image: RgbaImage,
    /// Offset of this frame on the animation canvas.
    pub left: u32,
    pub top: u32,
    /// Embedded animation delay; 0 for still images.
    pub delay_us: u32,
}

impl SourceFrame {
    pub fn still(image: RgbaImage) -> Self {
        Self {
            image,
            left: 0,
            top: 0,
            delay_us: 0,
        }
    }

    fn from_animation(frame: Frame) -> Self {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay_us = u64::from(numer) * 1000 / u64::from(denom.max(1));
        Self {
            left: frame.left(),
            top: frame.top(),
            delay_us: u32::try_from(delay_us).unwrap_or(u32::MAX),
            image: frame.into_buffer(),
        }
    }
}

/// A full, scaled frame ready to be stored.
#[derive(Clone, Debug)]
pub struct ScaledFrame {
    pub image: RgbaImage,
    pub source_delay_us: u32,
}

/// The normalized result for one input.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    pub frames: Vec<ScaledFrame>,
}

impl FrameSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_multi_frame(&self) -> bool {
        self.frames.len() > 1
    }

    /// Size every frame was scaled to.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| f.image.dimensions())
    }
}

/// Placement options used when drawing frames onto the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Center the image on the panel instead of anchoring it top-left.
    pub center: bool,
    /// Brightness 0-100, baked into the stored pixels.
    pub brightness: u8,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            center: false,
            brightness: 100,
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode every frame of `path`. Animated GIF, APNG and animated WebP yield
/// one entry per frame; everything else yields a single still.
pub fn decode_frames(path: &Path) -> Result<Vec<SourceFrame>, LoadError> {
    let fail = |e: &dyn std::fmt::Display| LoadError::decode_failed(path, e);

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| fail(&e))?;

    let animation = match reader.format() {
        Some(ImageFormat::Gif) => {
            let decoder = GifDecoder::new(open_buffered(path)?).map_err(|e| fail(&e))?;
            Some(decoder.into_frames().collect_frames())
        }
        Some(ImageFormat::Png) => {
            let decoder = PngDecoder::new(open_buffered(path)?).map_err(|e| fail(&e))?;
            if decoder.is_apng().map_err(|e| fail(&e))? {
                let apng = decoder.apng().map_err(|e| fail(&e))?;
                Some(apng.into_frames().collect_frames())
            } else {
                None
            }
        }
        Some(ImageFormat::WebP) => {
            let decoder = WebPDecoder::new(open_buffered(path)?).map_err(|e| fail(&e))?;
            if decoder.has_animation() {
                Some(decoder.into_frames().collect_frames())
            } else {
                None
            }
        }
        _ => None,
    };

    match animation {
        Some(frames) => {
            let frames = frames.map_err(|e| fail(&e))?;
            Ok(frames.into_iter().map(SourceFrame::from_animation).collect())
        }
        None => {
            let img = reader.decode().map_err(|e| fail(&e))?;
            Ok(vec![SourceFrame::still(img.to_rgba8())])
        }
    }
}

fn open_buffered(path: &Path) -> Result<BufReader<File>, LoadError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| LoadError::decode_failed(path, e))
}

// ── Coalescing and scaling ───────────────────────────────────────────

/// Flatten partial-update frames into full frames.
///
/// The canvas is the extent of the first frame. A frame that already covers
/// the whole canvas replaces it; anything else is composited over the
/// previous coalesced frame at its offset.
pub fn coalesce(frames: Vec<SourceFrame>) -> Vec<(RgbaImage, u32)> {
    let Some(first) = frames.first() else {
        return Vec::new();
    };
    let width = first.left + first.image.width();
    let height = first.top + first.image.height();

    let mut canvas = RgbaImage::new(width, height);
    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        let covers_canvas =
            frame.left == 0 && frame.top == 0 && frame.image.dimensions() == (width, height);
        if covers_canvas {
            canvas = frame.image;
        } else {
            imageops::overlay(&mut canvas, &frame.image, frame.left.into(), frame.top.into());
        }
        out.push((canvas.clone(), frame.delay_us));
    }
    out
}

/// Final frame size for a `w0 × h0` image asked to fit `target_w × target_h`.
///
/// - fill both: scale by the larger of the two fractions so the image covers
///   both axes (diagonal scrolling);
/// - fill height: keep the target height, derive the width from the aspect;
/// - fill width: keep the target width, derive the height;
/// - neither: stretch to the target as given.
pub fn scaled_dimensions(
    w0: u32,
    h0: u32,
    target_w: u32,
    target_h: u32,
    fill_width: bool,
    fill_height: bool,
) -> (u32, u32) {
    let width_fraction = target_w as f32 / w0.max(1) as f32;
    let height_fraction = target_h as f32 / h0.max(1) as f32;
    let scale = |fraction: f32, length: u32| (fraction * length as f32).round() as u32;

    let (w, h) = match (fill_width, fill_height) {
        (true, true) => {
            let larger = width_fraction.max(height_fraction);
            (scale(larger, w0), scale(larger, h0))
        }
        (false, true) => (scale(height_fraction, w0), target_h),
        (true, false) => (target_w, scale(width_fraction, h0)),
        (false, false) => (target_w, target_h),
    };
    (w.max(1), h.max(1))
}

/// Coalesce and scale already decoded frames.
pub fn normalize_frames(
    path: &Path,
    frames: Vec<SourceFrame>,
    target_w: u32,
    target_h: u32,
    fill_width: bool,
    fill_height: bool,
) -> Result<FrameSequence, LoadError> {
    if frames.is_empty() {
        return Err(LoadError::NoFrames {
            path: path.to_path_buf(),
        });
    }

    let full_frames = if frames.len() > 1 {
        coalesce(frames)
    } else {
        frames
            .into_iter()
            .map(|f| (f.image, f.delay_us))
            .collect()
    };

    let (w0, h0) = full_frames[0].0.dimensions();
    let (width, height) = scaled_dimensions(w0, h0, target_w, target_h, fill_width, fill_height);

    let frames = full_frames
        .into_iter()
        .map(|(image, source_delay_us)| {
            let image = if image.dimensions() == (width, height) {
                image
            } else {
                imageops::resize(&image, width, height, FilterType::Lanczos3)
            };
            ScaledFrame {
                image,
                source_delay_us,
            }
        })
        .collect();

    Ok(FrameSequence { frames })
}

/// Decode `path` and scale it for a `target_w × target_h` display.
pub fn load_and_scale(
    path: &Path,
    target_w: u32,
    target_h: u32,
    fill_width: bool,
    fill_height: bool,
) -> Result<FrameSequence, LoadError> {
    let frames = decode_frames(path)?;
    normalize_frames(path, frames, target_w, target_h, fill_width, fill_height)
}

// ── Storing ──────────────────────────────────────────────────────────

/// Display duration of one frame in microseconds.
pub fn frame_delay_us(source_delay_us: u32, is_multi_frame: bool, wait: Duration) -> u32 {
    let delay_us = if is_multi_frame {
        source_delay_us
    } else {
        u32::try_from(wait.as_micros()).unwrap_or(u32::MAX)
    };
    if delay_us == 0 {
        DEFAULT_FRAME_DELAY_US
    } else {
        delay_us
    }
}

/// Draw every frame of `seq` onto `scratch` and append it to `out`.
///
/// Returns the number of frames written.
pub fn store_sequence(
    seq: &FrameSequence,
    params: &PlaybackParams,
    options: StoreOptions,
    scratch: &mut FrameBuffer,
    out: &mut FrameStream,
) -> Result<usize, StreamError> {
    let is_multi_frame = seq.is_multi_frame();
    for frame in &seq.frames {
        let (x_offset, y_offset) = if options.center {
            (
                (scratch.width() as i32 - frame.image.width() as i32) / 2,
                (scratch.height() as i32 - frame.image.height() as i32) / 2,
            )
        } else {
            (0, 0)
        };

        scratch.clear();
        scratch.draw_image(&frame.image, x_offset, y_offset, options.brightness);
        let delay_us = frame_delay_us(frame.source_delay_us, is_multi_frame, params.wait);
        out.write(scratch, delay_us)?;
    }
    Ok(seq.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, PanelConfig};
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    // ── Scaling policy ─────────────────────────────────────────────

    #[rstest]
    #[case::fill_width(100, 50, 50, 50, true, false, (50, 25))]
    #[case::fill_both_takes_larger(100, 50, 60, 60, true, true, (120, 60))]
    #[case::fill_height(100, 50, 64, 32, false, true, (64, 32))]
    #[case::fill_height_wide(100, 50, 10, 64, false, true, (128, 64))]
    #[case::fill_width_tall(50, 100, 64, 10, true, false, (64, 128))]
    #[case::stretch(100, 50, 64, 64, false, false, (64, 64))]
    #[case::never_zero(1000, 10, 64, 64, true, false, (64, 1))]
    fn test_scaled_dimensions(
        #[case] w0: u32,
        #[case] h0: u32,
        #[case] target_w: u32,
        #[case] target_h: u32,
        #[case] fill_width: bool,
        #[case] fill_height: bool,
        #[case] expected: (u32, u32),
    ) {
        assert_eq!(
            scaled_dimensions(w0, h0, target_w, target_h, fill_width, fill_height),
            expected
        );
    }

    // ── Delays ─────────────────────────────────────────────────────

    #[rstest]
    #[case::embedded(50_000, true, 1500, 50_000)]
    #[case::zero_embedded(0, true, 1500, DEFAULT_FRAME_DELAY_US)]
    #[case::still_uses_wait(50_000, false, 1500, 1_500_000)]
    #[case::zero_wait(0, false, 0, DEFAULT_FRAME_DELAY_US)]
    fn test_frame_delay_us(
        #[case] source: u32,
        #[case] multi: bool,
        #[case] wait_ms: u64,
        #[case] expected: u32,
    ) {
        assert_eq!(
            frame_delay_us(source, multi, Duration::from_millis(wait_ms)),
            expected
        );
    }

    // ── Coalescing ─────────────────────────────────────────────────

    #[test]
    fn coalesce_composites_partial_updates() {
        let base = SourceFrame {
            image: solid(4, 4, [255, 0, 0, 255]),
            left: 0,
            top: 0,
            delay_us: 10,
        };
        let patch = SourceFrame {
            image: solid(2, 2, [0, 0, 255, 255]),
            left: 2,
            top: 2,
            delay_us: 20,
        };

        let frames = coalesce(vec![base, patch]);
        assert_eq!(frames.len(), 2);

        let (second, delay) = &frames[1];
        assert_eq!(*delay, 20);
        assert_eq!(second.dimensions(), (4, 4));
        assert_eq!(second.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(second.get_pixel(3, 3), &Rgba([0, 0, 255, 255]));
        // The first frame is not touched by the patch.
        assert_eq!(frames[0].0.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn coalesce_keeps_previous_pixels_under_transparency() {
        let base = SourceFrame {
            image: solid(2, 1, [10, 20, 30, 255]),
            left: 0,
            top: 0,
            delay_us: 0,
        };
        let update = SourceFrame {
            image: solid(1, 1, [0, 0, 0, 0]),
            left: 1,
            top: 0,
            delay_us: 0,
        };

        let frames = coalesce(vec![base, update]);
        assert_eq!(frames[1].0.get_pixel(1, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn normalize_scales_every_frame_identically() {
        let frames = vec![
            SourceFrame {
                image: solid(100, 50, [1, 1, 1, 255]),
                left: 0,
                top: 0,
                delay_us: 30_000,
            },
            SourceFrame {
                image: solid(20, 10, [2, 2, 2, 255]),
                left: 10,
                top: 10,
                delay_us: 0,
            },
        ];
        let seq = normalize_frames(Path::new("anim.gif"), frames, 50, 50, true, false).unwrap();
        assert!(seq.is_multi_frame());
        assert_eq!(seq.dimensions(), Some((50, 25)));
        assert!(seq.frames.iter().all(|f| f.image.dimensions() == (50, 25)));
        assert_eq!(seq.frames[0].source_delay_us, 30_000);
    }

    #[test]
    fn normalize_without_frames_is_no_frames() {
        let err = normalize_frames(Path::new("empty.gif"), Vec::new(), 64, 64, false, false)
            .unwrap_err();
        assert!(matches!(err, LoadError::NoFrames { .. }));
    }

    // ── Decoding real files ────────────────────────────────────────

    #[test]
    fn still_png_is_a_single_frame() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("still.png");
        solid(32, 16, [200, 100, 0, 255]).save(&path).unwrap();

        let seq = load_and_scale(&path, 64, 64, false, true).unwrap();
        assert!(!seq.is_multi_frame());
        assert_eq!(seq.dimensions(), Some((128, 64)));
    }

    #[test]
    fn animated_gif_keeps_frame_order_and_delays() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anim.gif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let frames = vec![
                Frame::from_parts(
                    solid(8, 8, [255, 0, 0, 255]),
                    0,
                    0,
                    Delay::from_numer_denom_ms(50, 1),
                ),
                Frame::from_parts(
                    solid(8, 8, [0, 255, 0, 255]),
                    0,
                    0,
                    Delay::from_numer_denom_ms(0, 1),
                ),
                Frame::from_parts(
                    solid(8, 8, [0, 0, 255, 255]),
                    0,
                    0,
                    Delay::from_numer_denom_ms(200, 1),
                ),
            ];
            encoder.encode_frames(frames).unwrap();
        }

        let seq = load_and_scale(&path, 16, 16, false, false).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.dimensions(), Some((16, 16)));

        let panel = PanelConfig::new(16, 16);
        let mut stream = FrameStream::in_memory(panel);
        let mut scratch = FrameBuffer::for_panel(panel);
        let params = PlaybackParams::default();
        store_sequence(&seq, &params, StoreOptions::default(), &mut scratch, &mut stream)
            .unwrap();

        let mut delays = Vec::new();
        while let Some(delay) = stream.read_next(&mut scratch).unwrap() {
            delays.push(delay);
        }
        assert_eq!(delays, vec![50_000, DEFAULT_FRAME_DELAY_US, 200_000]);
    }

    #[test]
    fn garbage_file_is_decode_failed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = load_and_scale(&path, 64, 64, false, false).unwrap_err();
        assert!(matches!(err, LoadError::DecodeFailed { .. }));
    }

    #[test]
    fn missing_file_is_decode_failed() {
        let err = load_and_scale(Path::new("/nonexistent/cat.gif"), 64, 64, false, false)
            .unwrap_err();
        assert!(matches!(err, LoadError::DecodeFailed { .. }));
    }

    // ── Storing ────────────────────────────────────────────────────

    #[test]
    fn still_is_stored_with_wait_time() {
        let seq = FrameSequence {
            frames: vec![ScaledFrame {
                image: solid(4, 4, [9, 9, 9, 255]),
                source_delay_us: 0,
            }],
        };
        let panel = PanelConfig::new(4, 4);
        let mut stream = FrameStream::in_memory(panel);
        let mut scratch = FrameBuffer::for_panel(panel);
        let params = PlaybackParams {
            wait: Duration::from_secs(2),
            ..PlaybackParams::default()
        };

        let written =
            store_sequence(&seq, &params, StoreOptions::default(), &mut scratch, &mut stream)
                .unwrap();
        assert_eq!(written, 1);
        assert_eq!(stream.read_next(&mut scratch).unwrap(), Some(2_000_000));
        assert_eq!(scratch.pixel(3, 3), Some(Color::new(9, 9, 9)));
    }

    #[test]
    fn centered_frame_lands_in_the_middle() {
        let seq = FrameSequence {
            frames: vec![ScaledFrame {
                image: solid(2, 2, [255, 255, 255, 255]),
                source_delay_us: 0,
            }],
        };
        let panel = PanelConfig::new(4, 4);
        let mut stream = FrameStream::in_memory(panel);
        let mut scratch = FrameBuffer::for_panel(panel);
        let options = StoreOptions {
            center: true,
            brightness: 100,
        };

        store_sequence(&seq, &PlaybackParams::default(), options, &mut scratch, &mut stream)
            .unwrap();
        stream.read_next(&mut scratch).unwrap();

        assert_eq!(scratch.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(scratch.pixel(1, 1), Some(Color::new(255, 255, 255)));
        assert_eq!(scratch.pixel(2, 2), Some(Color::new(255, 255, 255)));
        assert_eq!(scratch.pixel(3, 3), Some(Color::BLACK));
    }
}
