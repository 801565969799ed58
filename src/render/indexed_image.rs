use crate::error::FlxError;
use crate::flx::palette::Palette;
use crate::render::framebuffer::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};

/// palette index that is never drawn
pub const TRANSPARENT_INDEX: u8 = 0xFF;


/// IndexedImage stores palette indices of a decoded frame together with its bounding box.
/// The box is given relative to the hotspot of the frame and is inclusive on all sides,
/// pixel (left, top) is stored first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedImage {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    pixels: Vec<u8>,    // TRANSPARENT_INDEX for pixels that were never set
}

impl IndexedImage {
    /// creates a fully transparent image, fails for boxes that do not fit on the screen
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, FlxError> {
        let width = right - left + 1;
        let height = bottom - top + 1;

        if width <= 0 || height <= 0 || width > SCREEN_WIDTH as i32 || height > SCREEN_HEIGHT as i32 {
            return Err(FlxError::OversizedImage { width, height });
        }

        Ok(Self {
            left,
            top,
            right,
            bottom,
            pixels: vec![TRANSPARENT_INDEX; (width * height) as usize],
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.right - self.left + 1) as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.bottom - self.top + 1) as usize
    }

    /// (left, top, right, bottom), inclusive
    #[inline]
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.left, self.top, self.right, self.bottom)
    }

    #[inline]
    fn local_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < self.left || x > self.right || y < self.top || y > self.bottom {
            return None;
        }
        Some((y - self.top) as usize * self.width() + (x - self.left) as usize)
    }

    /// palette index at x, y given in hotspot coordinates, `None` if transparent or outside
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        self.local_index(x, y)
            .map(|i| self.pixels[i])
            .filter(|&index| index != TRANSPARENT_INDEX)
    }

    /// number of pixels that are not transparent
    pub fn opaque_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&index| index != TRANSPARENT_INDEX).count()
    }

    /// writes a horizontal run starting at x, y, one pixel per byte.
    /// TRANSPARENT_INDEX bytes only advance the position.
    /// Returns false and writes nothing if the run does not fit in the bounding box.
    pub fn set_span(&mut self, x: i32, y: i32, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }

        let last_x = x + data.len() as i32 - 1;
        let first = match (self.local_index(x, y), self.local_index(last_x, y)) {
            (Some(first), Some(_)) => first,
            _ => return false,
        };

        for (pixel, &index) in self.pixels[first..].iter_mut().zip(data) {
            if index != TRANSPARENT_INDEX {
                *pixel = index;
            }
        }

        true
    }

    /// draws the image with its hotspot at screen_x, screen_y.
    /// Transparent pixels and indices without a color leave the target untouched,
    /// the image is clipped to the target. Returns the number of written pixels.
    pub fn blit(&self, target: &mut FrameBuffer, palette: &Palette, screen_x: i32, screen_y: i32) -> usize {
        let (left, top) = (self.left + screen_x, self.top + screen_y);
        let (right, bottom) = (self.right + screen_x, self.bottom + screen_y);

        let max_x = target.width() as i32 - 1;
        let max_y = target.height() as i32 - 1;

        // entirely outside
        if right < 0 || bottom < 0 || left > max_x || top > max_y {
            return 0;
        }

        let (x0, x1) = (left.max(0), right.min(max_x));
        let (y0, y1) = (top.max(0), bottom.min(max_y));

        let width = self.width();
        let mut written = 0;

        for y in y0..=y1 {
            let row = (y - top) as usize * width;
            for x in x0..=x1 {
                let index = self.pixels[row + (x - left) as usize];
                if index == TRANSPARENT_INDEX {
                    continue;
                }

                if let Some(color) = palette.color(index) {
                    target.put_pixel(x as usize, y as usize, color);
                    written += 1;
                }
            }
        }

        written
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::flx::fixtures::ramp_palette;
    use crate::flx::palette::ChannelScale;

    fn palette() -> Palette {
        Palette::decode(&ramp_palette(), 0, ChannelScale::Shift).unwrap()
    }

    fn solid(left: i32, top: i32, right: i32, bottom: i32, index: u8) -> IndexedImage {
        let mut image = IndexedImage::new(left, top, right, bottom).unwrap();
        let row = vec![index; image.width()];
        for y in top..=bottom {
            assert!(image.set_span(left, y, &row));
        }
        image
    }

    #[test]
    fn oversized_box_is_rejected() {
        assert!(IndexedImage::new(0, 0, 319, 199).is_ok());
        assert!(matches!(IndexedImage::new(0, 0, 320, 0), Err(FlxError::OversizedImage { width: 321, height: 1 })));
        assert!(IndexedImage::new(-100, -201, 0, 0).is_err());
    }

    #[test]
    fn span_skips_transparent_bytes() {
        let mut image = IndexedImage::new(-2, -1, 2, 1).unwrap();
        assert_eq!((image.width(), image.height()), (5, 3));

        assert!(image.set_span(-2, 0, &[1, 0xFF, 3]));
        assert_eq!(image.pixel(-2, 0), Some(1));
        assert_eq!(image.pixel(-1, 0), None);
        assert_eq!(image.pixel(0, 0), Some(3));
        assert_eq!(image.opaque_pixels(), 2);
    }

    #[test]
    fn span_outside_box_writes_nothing() {
        let mut image = IndexedImage::new(0, 0, 3, 3).unwrap();

        assert!(!image.set_span(2, 0, &[1, 2, 3]));
        assert!(!image.set_span(0, 4, &[1]));
        assert!(!image.set_span(-1, 0, &[1]));
        assert_eq!(image.opaque_pixels(), 0);
    }

    #[test]
    fn blit_writes_palette_colors() {
        let mut fb = FrameBuffer::new();
        let mut image = IndexedImage::new(-1, -1, 0, 0).unwrap();
        image.set_span(-1, -1, &[10, 0xFF]);
        image.set_span(-1, 0, &[20, 30]);

        let written = image.blit(&mut fb, &palette(), 10, 10);

        assert_eq!(written, 3);
        assert_eq!(fb.pixel(9, 9), Some([40, 40, 40, 255]));
        assert_eq!(fb.pixel(10, 9), Some([0, 0, 0, 255]));
        assert_eq!(fb.pixel(9, 10), Some([80, 80, 80, 255]));
        assert_eq!(fb.pixel(10, 10), Some([120, 120, 120, 255]));
    }

    #[test]
    fn blit_clips_right_and_bottom_edges() {
        let mut fb = FrameBuffer::new();
        let image = solid(0, 0, 7, 7, 1);

        let written = image.blit(&mut fb, &palette(), 316, 196);
        assert_eq!(written, 16);

        for y in 0..200 {
            for x in 0..320 {
                let expected = if x >= 316 && y >= 196 { [4, 4, 4, 255] } else { [0, 0, 0, 255] };
                assert_eq!(fb.pixel(x, y), Some(expected), "pixel {x},{y}");
            }
        }
    }

    #[test]
    fn blit_clips_left_and_top_edges() {
        let mut fb = FrameBuffer::new();
        let image = solid(-7, -7, 0, 0, 2);

        assert_eq!(image.blit(&mut fb, &palette(), 1, 0), 2);
        assert_eq!(fb.pixel(0, 0), Some([8, 8, 8, 255]));
        assert_eq!(fb.pixel(1, 0), Some([8, 8, 8, 255]));
        assert_eq!(fb.pixel(2, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn blit_outside_does_nothing() {
        let mut fb = FrameBuffer::new();
        let untouched = fb.clone();
        let image = solid(0, 0, 7, 7, 1);

        assert_eq!(image.blit(&mut fb, &palette(), 320, 0), 0);
        assert_eq!(image.blit(&mut fb, &palette(), 0, 200), 0);
        assert_eq!(image.blit(&mut fb, &palette(), -8, 5), 0);
        assert_eq!(image.blit(&mut fb, &palette(), 5, -8), 0);
        assert!(fb == untouched);
    }
}
