use image::{ImageBuffer, Rgba, RgbaImage};

pub const SCREEN_WIDTH: usize = 320;
pub const SCREEN_HEIGHT: usize = 200;


/// FrameBuffer is the fixed 320x200 rgba8 surface images are composited onto.
/// Pixels are stored row by row, 4 bytes per pixel.
#[derive(Clone, PartialEq)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        let mut result = Self {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
        };
        result.clear((0, 0, 0));
        result
    }

    #[inline]
    pub fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    #[inline]
    pub fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    pub fn clear(&mut self, (r, g, b): (u8, u8, u8)) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[r, g, b, 255]);
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return None;
        }
        let i = (y * SCREEN_WIDTH + x) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// x, y must be inside the surface, the caller clips
    #[inline]
    pub(crate) fn put_pixel(&mut self, x: usize, y: usize, (r, g, b): (u8, u8, u8)) {
        debug_assert!(x < SCREEN_WIDTH && y < SCREEN_HEIGHT);
        let i = (y * SCREEN_WIDTH + x) * 4;
        self.pixels[i..i + 4].copy_from_slice(&[r, g, b, 255]);
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// average color of the area, the area is clipped to the surface
    pub fn average_color(&self, left: usize, top: usize, width: usize, height: usize) -> (u8, u8, u8, u8) {
        let right = (left + width).min(SCREEN_WIDTH);
        let bottom = (top + height).min(SCREEN_HEIGHT);

        let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
        for y in top..bottom {
            for x in left..right {
                let i = (y * SCREEN_WIDTH + x) * 4;
                r += self.pixels[i] as u32;
                g += self.pixels[i + 1] as u32;
                b += self.pixels[i + 2] as u32;
                n += 1;
            }
        }

        if n == 0 {
            return (0, 0, 0, 255);
        }

        ((r / n) as u8, (g / n) as u8, (b / n) as u8, 255)
    }

    pub fn to_image(&self) -> RgbaImage {
        ImageBuffer::from_fn(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, |x, y| {
            let i = (y as usize * SCREEN_WIDTH + x as usize) * 4;
            Rgba([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
        })
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_opaque_black() {
        let fb = FrameBuffer::new();
        assert_eq!(fb.as_raw().len(), 320 * 200 * 4);
        assert_eq!(fb.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(fb.pixel(319, 199), Some([0, 0, 0, 255]));
        assert_eq!(fb.pixel(320, 0), None);
    }

    #[test]
    fn average_of_mixed_area() {
        let mut fb = FrameBuffer::new();
        fb.put_pixel(0, 0, (200, 100, 40));
        fb.put_pixel(1, 0, (0, 0, 0));

        assert_eq!(fb.average_color(0, 0, 2, 1), (100, 50, 20, 255));
        assert_eq!(fb.average_color(319, 199, 4, 4), (0, 0, 0, 255));
    }

    #[test]
    fn image_matches_buffer() {
        let mut fb = FrameBuffer::new();
        fb.put_pixel(5, 7, (1, 2, 3));

        let image = fb.to_image();
        assert_eq!(image.dimensions(), (320, 200));
        assert_eq!(image.get_pixel(5, 7), &Rgba([1, 2, 3, 255]));
        assert_eq!(image.as_raw(), fb.as_raw());
    }
}
