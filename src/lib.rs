//! Drift-free image and animation playback for RGB LED matrix panels.
//!
//! Every input is decoded, coalesced and scaled once, encoded into a
//! [`stream::FrameStream`], and then replayed by the [`playback::Player`]
//! against wall-clock deadlines:
//!
//! ```text
//! normalize (decode + scale) -> stream (encode) -> [file] -> stream (decode) -> playback -> panel
//! ```
//!
//! This module holds the small shared pieces:
//! - Panel configuration
//! - Our own color type
//! - The cancellation token and the Ctrl+C handler that trips it

pub mod display;
pub mod error;
pub mod frame;
#[cfg(feature = "hardware")]
pub mod matrix;
pub mod media;
pub mod normalize;
pub mod params;
pub mod playback;
pub mod source;
pub mod stream;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Configuration for the LED panel dimensions.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s).
/// Frame buffers and frame streams are sized from it, so it is passed by
/// value everywhere instead of living in a global.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Number of bytes needed for a raw RGB frame (3 bytes per pixel).
    pub fn frame_byte_count(&self) -> usize {
        self.rows as usize * self.cols as usize * 3
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { rows: 64, cols: 64 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// This lets us test everything off the Pi without `rpi-led-matrix`.
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[cfg(test)]
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Cancellation ───────────────────────────────────────────────────

/// Cooperative stop signal shared between the signal handler and playback.
///
/// # Rust concept: Arc and AtomicBool
/// Cloning the token clones the `Arc`, so every clone observes the same
/// flag. Playback only polls it between frames; nothing blocks on it.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Install a SIGINT/SIGTERM handler that cancels the returned token.
///
/// Can only be called once per process.
pub fn setup_signal_handler() -> Result<CancellationToken, ctrlc::Error> {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    ctrlc::set_handler(move || {
        handler_token.cancel();
    })?;

    Ok(token)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // ── PanelConfig tests ──────────────────────────────────────────

    #[test]
    fn panel_config_default_is_64x64() {
        let panel = PanelConfig::default();
        assert_eq!(panel.rows, 64);
        assert_eq!(panel.cols, 64);
    }

    #[rstest]
    #[case(64, 64, 12288)]
    #[case(32, 32, 3072)]
    #[case(128, 64, 24576)]
    #[case(32, 64, 6144)]
    fn test_frame_byte_count(#[case] rows: u32, #[case] cols: u32, #[case] expected: usize) {
        assert_eq!(PanelConfig::new(rows, cols).frame_byte_count(), expected);
    }

    // ── Color tests ────────────────────────────────────────────────

    #[test]
    fn apply_brightness_100_is_identity() {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(100), c);
    }

    #[test]
    fn apply_brightness_0_is_black() {
        let c = Color::new(255, 255, 255);
        assert_eq!(c.apply_brightness(0), Color::BLACK);
    }

    #[test]
    fn apply_brightness_50_halves() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.apply_brightness(50), Color::new(100, 50, 25));
    }

    // ── Cancellation tests ─────────────────────────────────────────

    #[test]
    fn token_starts_uncancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
