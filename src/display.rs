//! The display surface the player draws into.
//!
//! A surface owns a front and a back buffer. Drawing always goes to the back
//! buffer; `swap` exchanges the two on a vertical sync boundary (buffers are
//! exchanged, never copied) and blocks until that happens.

use crate::Color;
use crate::frame::FrameBuffer;

pub trait DisplaySurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Set a pixel on the back buffer.
    fn set_pixel(&mut self, x: u32, y: u32, color: Color);

    /// Clear the back buffer to black.
    fn clear(&mut self);

    /// Present the back buffer, waiting for every `vsync_multiple`th refresh.
    fn swap(&mut self, vsync_multiple: u32);

    /// Copy a whole frame onto the back buffer.
    fn draw_frame(&mut self, frame: &FrameBuffer) {
        for (x, y, color) in frame.pixels() {
            self.set_pixel(x, y, color);
        }
    }

    /// Blank the visible display.
    fn blank(&mut self) {
        self.clear();
        self.swap(1);
    }
}

/// One step of presenting a frame on a panel that swaps every refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldStep {
    /// Swap buffers, waiting for the next refresh.
    Swap,
    /// Redraw the held frame into the back buffer the last swap returned.
    Redraw,
}

/// Steps that keep a frame up for `vsync_multiple` refreshes using only
/// single-refresh swaps: `n` swaps with a redraw between each pair, since
/// every swap hands back the stale previous front buffer.
pub fn hold_steps(vsync_multiple: u32) -> impl Iterator<Item = HoldStep> {
    let swaps = vsync_multiple.max(1);
    (0..swaps).flat_map(move |i| {
        let redraw = (i + 1 < swaps).then_some(HoldStep::Redraw);
        std::iter::once(HoldStep::Swap).chain(redraw)
    })
}
