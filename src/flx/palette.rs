use std::io::Cursor;
use serde::{Deserialize, Serialize};
use log::trace;

use crate::error::FlxError;
use crate::flx::flxreader::*;

pub const PALETTE_ENTRIES: usize = 256;
pub const PALETTE_SIZE: usize = PALETTE_ENTRIES * 3;

/// index ranges cycled by `Palette::animate`, bounds inclusive
pub const ANIMATED_RANGES: [(usize, usize); 6] = [
    (224, 231),
    (232, 239),
    (240, 243),
    (244, 247),
    (248, 251),
    (252, 254),
];

// channel format is |7|6|5|4|3|2|1|0|
//                   | | |V|V|V|V|V|V|
// 6 bit per r/g/b component, two high bits are unused
const CHANNEL_MASK: u8 = 0b0011_1111;


/// How a 6 bit channel is widened to 8 bits
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelScale {
    /// `v << 2`, the low bits are always zero and 63 becomes 252
    #[default]
    Shift,
    /// `round(v * 255 / 63)`, 63 becomes 255
    Proportional,
}

impl ChannelScale {
    #[inline]
    pub fn expand_channel(&self, value: u8) -> u8 {
        let value = value & CHANNEL_MASK;
        match self {
            ChannelScale::Shift => value << 2,
            ChannelScale::Proportional => ((value as u32 * 255 + 31) / 63) as u8,
        }
    }
}


/// Palette stores the 256 colors used to display indexed images, in rgb8 format
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<(u8, u8, u8)>,
}

impl Palette {
    /// decodes 256 packed rgb triples starting at `offset`
    pub fn decode(buffer: &[u8], offset: usize, scale: ChannelScale) -> Result<Self, FlxError> {
        trace!("Palette::decode at {offset}");
        check_range(buffer, offset, PALETTE_SIZE)?;

        let f = &mut Cursor::new(&buffer[offset..offset + PALETTE_SIZE]);
        let mut result = Self {
            colors: Vec::with_capacity(PALETTE_ENTRIES),
        };

        for _ in 0..PALETTE_ENTRIES {
            let r = flx_read_u8(f)?;
            let g = flx_read_u8(f)?;
            let b = flx_read_u8(f)?;
            result.colors.push((scale.expand_channel(r), scale.expand_channel(g), scale.expand_channel(b)));
        }

        Ok(result)
    }

    /// returns the color for the palette index, `None` for indices without a color
    #[inline]
    pub fn color(&self, index: u8) -> Option<(u8, u8, u8)> {
        self.colors.get(index as usize).copied()
    }

    #[inline]
    pub fn colors(&self) -> &[(u8, u8, u8)] {
        &self.colors
    }

    /// rotates every animated range by one entry, the last color of a range becomes the first.
    /// Must be called between frames, never while an image is being blitted.
    pub fn animate(&mut self) {
        for &(first, last) in ANIMATED_RANGES.iter() {
            if last < self.colors.len() {
                self.colors[first..=last].rotate_right(1);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::flx::fixtures::ramp_palette;

    #[test]
    fn shift_scale_is_a_multiple_of_four() {
        let buffer = ramp_palette();
        let palette = Palette::decode(&buffer, 0, ChannelScale::Shift).unwrap();

        assert_eq!(palette.colors().len(), 256);
        assert_eq!(palette.color(0), Some((0, 0, 0)));
        assert_eq!(palette.color(1), Some((4, 4, 4)));
        assert_eq!(palette.color(63), Some((252, 252, 252)));

        for &(r, g, b) in palette.colors() {
            for c in [r, g, b] {
                assert!(c <= 252);
                assert_eq!(c % 4, 0);
            }
        }
    }

    #[test]
    fn scales_disagree() {
        assert_eq!(ChannelScale::Shift.expand_channel(63), 252);
        assert_eq!(ChannelScale::Proportional.expand_channel(63), 255);
        assert_eq!(ChannelScale::Proportional.expand_channel(0), 0);
        // 32 * 255 / 63 = 129.5
        assert_eq!(ChannelScale::Proportional.expand_channel(32), 130);
        assert_eq!(ChannelScale::Shift.expand_channel(32), 128);
    }

    #[test]
    fn decode_is_deterministic() {
        let mut buffer = vec![0xEE; 5];
        buffer.extend(ramp_palette());

        let a = Palette::decode(&buffer, 5, ChannelScale::Shift).unwrap();
        let b = Palette::decode(&buffer, 5, ChannelScale::Shift).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_buffer_fails() {
        let buffer = vec![0u8; PALETTE_SIZE - 1];
        assert!(matches!(Palette::decode(&buffer, 0, ChannelScale::Shift), Err(FlxError::OutOfRange { .. })));
    }

    #[test]
    fn animation_rotates_ranges() {
        let buffer = ramp_palette();
        let original = Palette::decode(&buffer, 0, ChannelScale::Shift).unwrap();
        let mut palette = original.clone();

        palette.animate();
        assert_eq!(palette.color(224), original.color(231));
        assert_eq!(palette.color(225), original.color(224));
        assert_eq!(palette.color(252), original.color(254));
        assert_eq!(palette.color(255), original.color(255));
        assert_eq!(palette.colors()[..224], original.colors()[..224]);
    }

    #[test]
    fn animation_is_a_permutation() {
        let buffer = ramp_palette();
        let original = Palette::decode(&buffer, 0, ChannelScale::Shift).unwrap();
        let mut palette = original.clone();

        for _ in 0..8 {
            palette.animate();
            // nothing outside of the animated ranges ever changes
            assert_eq!(palette.colors()[..224], original.colors()[..224]);
            assert_eq!(palette.color(255), original.color(255));
        }

        // period of 8 restores the first two ranges, and the 4 entry ranges as well
        assert_eq!(palette.colors()[224..252], original.colors()[224..252]);

        // 3 entry range is restored after 24 ticks in total
        for _ in 0..16 {
            palette.animate();
        }
        assert_eq!(palette, original);
    }
}
