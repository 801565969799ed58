use std::fs;
use std::path::Path;
use log::trace;

use crate::error::FlxError;
use crate::flx::flxreader::*;

/// chunk is 16x16 tiles, region is 16x16 chunks, the world is 12x12 regions
pub const CHUNK_TILES: usize = 16;
pub const REGION_CHUNKS: usize = 16;
pub const WORLD_REGIONS: usize = 12;
pub const WORLD_CHUNKS: usize = WORLD_REGIONS * REGION_CHUNKS;

// a cell packs shape and frame into 16 bits
// |15|14|13|12|11|10| 9| 8| 7| 6| 5| 4| 3| 2| 1| 0|
// |  | F| F| F| F| F| S| S| S| S| S| S| S| S| S| S|
const SHAPE_MASK: u16 = 0x3FF;
const FRAME_MASK: u16 = 0x1F;
const FRAME_SHIFT: usize = 10;

/// frames a key can address
pub const KEY_FRAMES: usize = FRAME_MASK as usize + 1;

/// 16x16 shape-frame codes of one chunk, indexed as [y][x]
pub type ChunkBlock = [[u16; CHUNK_TILES]; CHUNK_TILES];

/// 16x16 chunk numbers of one region, indexed as [y][x]
pub type RegionBlock = [[u16; REGION_CHUNKS]; REGION_CHUNKS];

// both tables are made of 512 byte records
const CHUNK_RECORD_SIZE: usize = <ChunkBlock as FlxStruct>::SIZE;
const REGION_RECORD_SIZE: usize = <RegionBlock as FlxStruct>::SIZE;


#[inline]
pub fn shape_frame_key(shape: u16, frame: u16) -> u16 {
    (shape & SHAPE_MASK) | ((frame & FRAME_MASK) << FRAME_SHIFT)
}

#[inline]
pub fn key_shape(key: u16) -> u16 {
    key & SHAPE_MASK
}

#[inline]
pub fn key_frame(key: u16) -> u16 {
    (key >> FRAME_SHIFT) & FRAME_MASK
}


/// Chunks stores the chunk table, each chunk is a 16x16 block of tiles.
/// Can return a ref to ChunkBlock for the given chunk number
pub struct Chunks {
    blocks: Vec<ChunkBlock>,    // blocks in same order as in file
}

impl Chunks {
    pub fn decode(buffer: &[u8]) -> Result<Self, FlxError> {
        let count = buffer.len() / CHUNK_RECORD_SIZE;
        Ok(Self {
            blocks: read_structs(buffer, 0, count)?,
        })
    }

    pub fn read(path: &Path) -> Result<Self, FlxError> {
        trace!("Chunks::read {}", path.display());
        Self::decode(&fs::read(path)?)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn chunk(&self, chunk: usize) -> Result<&ChunkBlock, FlxError> {
        self.blocks.get(chunk).ok_or(FlxError::IndexOutOfRange { index: chunk, count: self.blocks.len() })
    }
}


/// WorldMap stores the region table: for every region the numbers of its 16x16 chunks.
/// Regions are stored row by row, 12 per row.
pub struct WorldMap {
    regions: Vec<RegionBlock>,
}

impl WorldMap {
    pub fn decode(buffer: &[u8]) -> Result<Self, FlxError> {
        let count = (buffer.len() / REGION_RECORD_SIZE).min(WORLD_REGIONS * WORLD_REGIONS);
        Ok(Self {
            regions: read_structs(buffer, 0, count)?,
        })
    }

    pub fn read(path: &Path) -> Result<Self, FlxError> {
        trace!("WorldMap::read {}", path.display());
        Self::decode(&fs::read(path)?)
    }

    pub fn region(&self, region_x: usize, region_y: usize) -> Result<&RegionBlock, FlxError> {
        let count = self.regions.len();
        if region_x >= WORLD_REGIONS || region_y >= WORLD_REGIONS {
            return Err(FlxError::IndexOutOfRange { index: region_y * WORLD_REGIONS + region_x, count });
        }

        let index = region_y * WORLD_REGIONS + region_x;
        self.regions.get(index).ok_or(FlxError::IndexOutOfRange { index, count })
    }

    /// chunk number at chunk coordinates, wraps around the world edges
    pub fn chunk_id(&self, chunk_x: isize, chunk_y: isize) -> Result<u16, FlxError> {
        let chunk_x = chunk_x.rem_euclid(WORLD_CHUNKS as isize) as usize;
        let chunk_y = chunk_y.rem_euclid(WORLD_CHUNKS as isize) as usize;

        let region = self.region(chunk_x / REGION_CHUNKS, chunk_y / REGION_CHUNKS)?;
        Ok(region[chunk_y % REGION_CHUNKS][chunk_x % REGION_CHUNKS])
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::flx::fixtures::u16_table;

    #[test]
    fn keys_pack_shape_and_frame() {
        assert_eq!(shape_frame_key(0x3FF, 31), 0x7FFF);
        assert_eq!(shape_frame_key(150, 3), 150 | (3 << 10));
        // out of range parts are masked
        assert_eq!(shape_frame_key(0x400 | 5, 32 | 1), 5 | (1 << 10));

        let key = shape_frame_key(777, 17);
        assert_eq!((key_shape(key), key_frame(key)), (777, 17));
    }

    #[test]
    fn chunk_cells_are_row_major() {
        let buffer = u16_table(3, |r, i| (r * 1000 + i) as u16);
        let chunks = Chunks::decode(&buffer).unwrap();

        assert_eq!(chunks.len(), 3);
        let chunk = chunks.chunk(2).unwrap();
        assert_eq!(chunk[0][0], 2000);
        assert_eq!(chunk[0][15], 2015);
        assert_eq!(chunk[1][0], 2016);
        assert_eq!(chunk[15][15], 2255);

        assert!(matches!(chunks.chunk(3), Err(FlxError::IndexOutOfRange { index: 3, count: 3 })));
    }

    #[test]
    fn partial_record_is_ignored() {
        let mut buffer = u16_table(1, |_, i| i as u16);
        buffer.extend_from_slice(&[1, 2, 3]);
        assert_eq!(Chunks::decode(&buffer).unwrap().len(), 1);
    }

    #[test]
    fn region_lookup() {
        let buffer = u16_table(144, |r, i| (r * 256 + i) as u16);
        let map = WorldMap::decode(&buffer).unwrap();

        let region = map.region(1, 2).unwrap();
        assert_eq!(region[0][0], (2 * 12 + 1) * 256);
        assert_eq!(region[3][4], (2 * 12 + 1) * 256 + 3 * 16 + 4);

        assert!(map.region(12, 0).is_err());
        assert!(map.region(0, 12).is_err());

        // chunk (17, 35) is in region (1, 2), cell (1, 3)
        assert_eq!(map.chunk_id(17, 35).unwrap(), (25 * 256 + 3 * 16 + 1) as u16);
        // coordinates wrap
        assert_eq!(map.chunk_id(-1, 0).unwrap(), map.chunk_id(191, 0).unwrap());
    }

    #[test]
    fn small_map_reports_missing_regions() {
        let map = WorldMap::decode(&u16_table(2, |_, _| 0)).unwrap();
        assert!(map.region(1, 0).is_ok());
        assert!(matches!(map.region(2, 0), Err(FlxError::IndexOutOfRange { index: 2, count: 2 })));
    }
}
