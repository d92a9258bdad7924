//! Fixed-size RGB frame buffer: the unit of display content.
//!
//! Pixels are stored row-major, three bytes per pixel in R, G, B order,
//! with a stride of `width * 3`. This is also the pixel layout of a stored
//! frame stream record, so a buffer can be written and refilled without any
//! per-pixel conversion.

use crate::{Color, PanelConfig};
use image::RgbaImage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create an all-black buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; PanelConfig::new(height, width).frame_byte_count()],
        }
    }

    /// Create a buffer matching the panel (`cols` wide, `rows` high).
    pub fn for_panel(panel: PanelConfig) -> Self {
        Self::new(panel.cols, panel.rows)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Set a pixel. Coordinates outside the buffer are clipped (ignored).
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(offset) = self.offset(x, y) {
            self.data[offset] = color.r;
            self.data[offset + 1] = color.g;
            self.data[offset + 2] = color.b;
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.offset(x, y)
            .map(|o| Color::new(self.data[o], self.data[o + 1], self.data[o + 2]))
    }

    /// Reset every pixel to black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Draw `img` with its top-left corner at (`x_offset`, `y_offset`).
    ///
    /// Only fully opaque pixels are drawn; anything hanging off the buffer
    /// is clipped. Brightness (0-100) is applied while copying.
    pub fn draw_image(&mut self, img: &RgbaImage, x_offset: i32, y_offset: i32, brightness: u8) {
        for (x, y, pixel) in img.enumerate_pixels() {
            if pixel[3] != u8::MAX {
                continue;
            }
            let c = Color::new(pixel[0], pixel[1], pixel[2]).apply_brightness(brightness);
            self.set_pixel(x as i32 + x_offset, y as i32 + y_offset, c);
        }
    }

    /// Iterate over every pixel as `(x, y, color)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, Color)> + '_ {
        let width = self.width.max(1);
        self.data.chunks_exact(3).enumerate().map(move |(i, px)| {
            let i = i as u32;
            (i % width, i / width, Color::new(px[0], px[1], px[2]))
        })
    }

    /// Raw pixel bytes in stream layout.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes, used by stream decode to refill in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn new_buffer_is_black() {
        let fb = FrameBuffer::new(4, 2);
        assert_eq!(fb.as_bytes().len(), 4 * 2 * 3);
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn for_panel_uses_cols_as_width() {
        let fb = FrameBuffer::for_panel(PanelConfig::new(32, 64));
        assert_eq!(fb.dimensions(), (64, 32));
    }

    #[test]
    fn set_pixel_is_row_major_rgb() {
        let mut fb = FrameBuffer::new(3, 2);
        fb.set_pixel(1, 1, Color::new(10, 20, 30));
        let offset = (3 + 1) * 3;
        assert_eq!(&fb.as_bytes()[offset..offset + 3], &[10, 20, 30]);
        assert_eq!(fb.pixel(1, 1), Some(Color::new(10, 20, 30)));
    }

    #[rstest]
    #[case(-1, 0)]
    #[case(0, -1)]
    #[case(4, 0)]
    #[case(0, 4)]
    #[case(100, 100)]
    fn out_of_bounds_writes_are_clipped(#[case] x: i32, #[case] y: i32) {
        let mut fb = FrameBuffer::new(4, 4);
        fb.set_pixel(x, y, Color::new(255, 255, 255));
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(fb.pixel(x, y), None);
    }

    #[test]
    fn clear_blacks_out_everything() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set_pixel(0, 0, Color::new(1, 2, 3));
        fb.clear();
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn draw_image_skips_transparent_and_clips() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 200, 0, 0]));
        img.put_pixel(0, 1, Rgba([0, 0, 200, 128]));
        img.put_pixel(1, 1, Rgba([9, 9, 9, 255]));

        let mut fb = FrameBuffer::new(2, 2);
        fb.draw_image(&img, 1, 0, 100);

        assert_eq!(fb.pixel(1, 0), Some(Color::new(200, 0, 0)));
        // (1,0) of the image lands at x=2 which is clipped; (1,1) likewise.
        assert_eq!(fb.pixel(0, 0), Some(Color::new(0, 0, 0)));
        assert_eq!(fb.pixel(1, 1), Some(Color::new(0, 0, 0)));
    }

    #[test]
    fn draw_image_applies_brightness() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        let mut fb = FrameBuffer::new(1, 1);
        fb.draw_image(&img, 0, 0, 50);
        assert_eq!(fb.pixel(0, 0), Some(Color::new(100, 50, 25)));
    }

    #[test]
    fn pixels_iterates_row_major() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set_pixel(1, 0, Color::new(1, 1, 1));
        let coords: Vec<(u32, u32)> = fb.pixels().map(|(x, y, _)| (x, y)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        let lit: Vec<(u32, u32)> = fb
            .pixels()
            .filter(|(_, _, c)| *c != Color::new(0, 0, 0))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit, vec![(1, 0)]);
    }
}
