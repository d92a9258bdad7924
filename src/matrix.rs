//! Hardware display surface backed by `rpi-led-matrix`.
//!
//! The C library is not thread-safe, so the matrix lives on the thread that
//! runs playback and is only touched from there.

use crate::display::{DisplaySurface, HoldStep, hold_steps};
use crate::error::ViewerError;
use crate::frame::FrameBuffer;
use crate::{Color, PanelConfig};
use rpi_led_matrix::{LedCanvas, LedMatrix, LedMatrixOptions, LedRuntimeOptions};

/// Matrix settings for our hardware: Pi Zero 2 W + Adafruit Bonnet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixConfig {
    pub panel: PanelConfig,
    pub hardware_mapping: String,
    pub gpio_slowdown: u32,
}

impl MatrixConfig {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            hardware_mapping: "adafruit-hat".to_string(),
            gpio_slowdown: 2, // Pi Zero 2 W requires slowdown=2
        }
    }
}

/// Create a matrix configured for our hardware.
///
/// Fails when not running as root or when GPIO is unavailable.
pub fn create_matrix(config: &MatrixConfig) -> Result<LedMatrix, ViewerError> {
    let unavailable = |e: &str| ViewerError::HardwareUnavailable(e.to_string());

    let mut options = LedMatrixOptions::new();
    options.set_rows(config.panel.rows);
    options.set_cols(config.panel.cols);
    options.set_hardware_mapping(&config.hardware_mapping);

    // PWM settings with stable output (~143Hz refresh)
    options.set_pwm_bits(8).map_err(unavailable)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(config.gpio_slowdown);

    LedMatrix::new(Some(options), Some(rt_options)).map_err(unavailable)
}

/// The panel as a double-buffered [`DisplaySurface`].
pub struct MatrixDisplay {
    matrix: LedMatrix,
    /// Back buffer; only `None` while it is handed to the matrix in `swap`.
    canvas: Option<LedCanvas>,
    panel: PanelConfig,
    /// Copy of the last frame drawn, for redraws while it is held.
    held: FrameBuffer,
}

impl MatrixDisplay {
    pub fn open(config: &MatrixConfig) -> Result<Self, ViewerError> {
        let matrix = create_matrix(config)?;
        let canvas = matrix.offscreen_canvas();
        tracing::info!(
            "Matrix ready: {}x{}, mapping {}",
            config.panel.cols,
            config.panel.rows,
            config.hardware_mapping
        );
        Ok(Self {
            matrix,
            canvas: Some(canvas),
            panel: config.panel,
            held: FrameBuffer::for_panel(config.panel),
        })
    }

    fn redraw_held(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            for (x, y, color) in self.held.pixels() {
                canvas.set(x as i32, y as i32, &color.into());
            }
        }
    }
}

impl DisplaySurface for MatrixDisplay {
    fn width(&self) -> u32 {
        self.panel.cols
    }

    fn height(&self) -> u32 {
        self.panel.rows
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.set(x as i32, y as i32, &color.into());
        }
    }

    fn clear(&mut self) {
        self.held.clear();
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.clear();
        }
    }

    fn draw_frame(&mut self, frame: &FrameBuffer) {
        self.held.clone_from(frame);
        self.redraw_held();
    }

    // The bindings only swap on the very next refresh, so longer holds are
    // built from single swaps.
    fn swap(&mut self, vsync_multiple: u32) {
        for step in hold_steps(vsync_multiple) {
            match step {
                HoldStep::Swap => {
                    if let Some(canvas) = self.canvas.take() {
                        self.canvas = Some(self.matrix.swap(canvas));
                    }
                }
                HoldStep::Redraw => self.redraw_held(),
            }
        }
    }
}
