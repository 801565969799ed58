use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use log::{info, trace};

use crate::config::Config;
use crate::error::FlxError;
use crate::flx::{Chunks, FlxArchive, FlxSlice, Palette, ShapeAttributes, TileAttributes, WorldMap};
use crate::flx::chunkdata::{ChunkBlock, RegionBlock, CHUNK_TILES, KEY_FRAMES, key_frame, key_shape, shape_frame_key};
use crate::flx::shapes::TILE_SIZE;
use crate::render::{FrameBuffer, IndexedImage, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::world::shape_cache::ShapeCache;

/// view size in tiles
pub const VIEW_TILES_X: usize = SCREEN_WIDTH / TILE_SIZE;
pub const VIEW_TILES_Y: usize = SCREEN_HEIGHT / TILE_SIZE;


/// Stores the loaded tables, read-only after loading
pub struct WorldData {
    pub shapes: FlxArchive,             // data from shapes.vga
    pub palettes: FlxArchive,           // data from palettes.flx
    pub attributes: TileAttributes,     // data from tfa.dat
    pub chunks: Chunks,                 // data from u7chunks
    pub map: WorldMap,                  // data from u7map
}

impl WorldData {
    pub fn read(config: &Config) -> Result<Self, FlxError> {
        trace!("WorldData::read from {}", config.data_dir.display());
        Ok(WorldData {
            shapes: FlxArchive::read(&config.shapes_path())?,
            palettes: FlxArchive::read(&config.palettes_path())?,
            attributes: TileAttributes::read(&config.attributes_path())?,
            chunks: Chunks::read(&config.chunks_path())?,
            map: WorldMap::read(&config.map_path())?,
        })
    }
}


/// WorldModel is one rendering session: the loaded data, the animated palette,
/// the decoded frame cache and the tick counter used for animated shapes.
/// Palette and counter only change through `tick` and friends, between frames.
pub struct WorldModel {
    pub data: Arc<WorldData>,
    palette: RwLock<Palette>,
    cache: ShapeCache,
    frame_counter: AtomicUsize,
}

impl WorldModel {
    pub fn new(data: Arc<WorldData>, palette: Palette) -> Self {
        WorldModel {
            data,
            palette: RwLock::new(palette),
            cache: ShapeCache::new(),
            frame_counter: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FlxError> {
        let start = Instant::now();
        let data = WorldData::read(config)?;

        let FlxSlice { offset, .. } = data.palettes.record_range(config.palette_index)?;
        let palette = Palette::decode(data.palettes.data(), offset, config.channel_scale)?;

        info!("{} shapes, {} chunks loaded in {:?}", data.shapes.num_records(), data.chunks.len(), start.elapsed());
        Ok(Self::new(Arc::new(data), palette))
    }

    #[inline]
    pub fn read_palette(&self) -> RwLockReadGuard<Palette> {
        self.palette.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn animate_palette(&self) {
        self.palette.write().unwrap_or_else(PoisonError::into_inner).animate();
    }

    pub fn advance_frame(&self) {
        self.frame_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// one render tick: cycles the palette and moves animated shapes to their next frame
    pub fn tick(&self) {
        self.animate_palette();
        self.advance_frame();
    }

    #[inline]
    pub fn frame_counter(&self) -> usize {
        self.frame_counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cache(&self) -> &ShapeCache {
        &self.cache
    }

    pub fn shape_frame(&self, key: u16) -> Option<Arc<IndexedImage>> {
        self.cache.get_shape_frame(&self.data.shapes, key)
    }

    /// attributes of the shape with the number of its frames filled in
    pub fn shape_attributes(&self, shape: usize) -> Result<ShapeAttributes, FlxError> {
        let attributes = *self.data.attributes.get(shape)?;
        let frame_count = self.data.shapes.shape_frame_count(shape)?;
        Ok(attributes.with_frame_count(frame_count))
    }

    /// key of the frame to draw for a chunk cell, animated shapes step through their frames.
    /// Only the first 32 frames can be addressed by a key, longer animations cycle through those.
    pub fn effective_key(&self, key: u16) -> u16 {
        let shape = key_shape(key);
        let animated = match self.shape_attributes(shape as usize) {
            Ok(attributes) if attributes.animated && attributes.frame_count > 0 => attributes,
            _ => return key,
        };

        let frame_count = animated.frame_count.min(KEY_FRAMES);
        let frame = (key_frame(key) as usize + self.frame_counter()) % frame_count;
        shape_frame_key(shape, frame as u16)
    }

    pub fn chunk(&self, chunk: usize) -> Result<&ChunkBlock, FlxError> {
        self.data.chunks.chunk(chunk)
    }

    pub fn world_region(&self, region_x: usize, region_y: usize) -> Result<&RegionBlock, FlxError> {
        self.data.map.region(region_x, region_y)
    }

    /// Composites the 40x25 tiles whose top left tile is tile_x, tile_y.
    /// Chunks are drawn row by row, and the tiles of a chunk row by row as well,
    /// the hotspot of every image is the bottom right pixel of its cell.
    pub fn render_view(&self, target: &mut FrameBuffer, tile_x: isize, tile_y: isize) {
        target.clear((0, 0, 0));

        // held for the whole frame, palette animation waits until the frame is complete
        let palette = self.read_palette();

        let chunk_tiles = CHUNK_TILES as isize;
        let (view_right, view_bottom) = (tile_x + VIEW_TILES_X as isize, tile_y + VIEW_TILES_Y as isize);

        for chunk_y in tile_y.div_euclid(chunk_tiles)..=(view_bottom - 1).div_euclid(chunk_tiles) {
            for chunk_x in tile_x.div_euclid(chunk_tiles)..=(view_right - 1).div_euclid(chunk_tiles) {
                let chunk = match self.data.map.chunk_id(chunk_x, chunk_y).and_then(|id| self.chunk(id as usize)) {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        trace!("chunk {chunk_x},{chunk_y} skipped: {err}");
                        continue;
                    }
                };

                for (cell_y, row) in chunk.iter().enumerate() {
                    let world_y = chunk_y * chunk_tiles + cell_y as isize;
                    if world_y < tile_y || world_y >= view_bottom {
                        continue;
                    }

                    for (cell_x, &key) in row.iter().enumerate() {
                        let world_x = chunk_x * chunk_tiles + cell_x as isize;
                        if world_x < tile_x || world_x >= view_right {
                            continue;
                        }

                        if let Some(image) = self.shape_frame(self.effective_key(key)) {
                            let screen_x = (world_x - tile_x) as i32 * TILE_SIZE as i32 + TILE_SIZE as i32 - 1;
                            let screen_y = (world_y - tile_y) as i32 * TILE_SIZE as i32 + TILE_SIZE as i32 - 1;
                            image.blit(target, &palette, screen_x, screen_y);
                        }
                    }
                }
            }
        }
    }

    /// Draws a single frame centered on the cleared target.
    /// Returns false if the frame has no image.
    pub fn render_shape(&self, target: &mut FrameBuffer, shape: u16, frame: u16) -> bool {
        target.clear((0, 0, 0));

        let image = match self.shape_frame(shape_frame_key(shape, frame)) {
            Some(image) => image,
            None => return false,
        };

        let (left, top, right, bottom) = image.bounds();
        let screen_x = SCREEN_WIDTH as i32 / 2 - (left + right) / 2;
        let screen_y = SCREEN_HEIGHT as i32 / 2 - (top + bottom) / 2;

        image.blit(target, &self.read_palette(), screen_x, screen_y);
        true
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::flx::ChannelScale;
    use crate::flx::fixtures::*;

    const GRASS: u16 = 0;
    const WATER: u16 = 1;
    const STATUE: u16 = 2;
    const FOUNTAIN: u16 = 3;

    fn raw_tiles(indices: &[u8]) -> Vec<u8> {
        indices.iter().flat_map(|&i| vec![i; 64]).collect()
    }

    /// chunk 0 is grass everywhere, chunk 1 is water with a statue in cell (0, 0).
    /// Every region uses chunk 0, except chunk (1, 0) of region (0, 0).
    fn model() -> WorldModel {
        let statue = framed_shape(&[frame(9, 0, 1, 0, &[raw_span(0, -1, &[30; 10]), raw_span(0, 0, &[31; 10])])]);
        let fountain = raw_tiles(&(0..40).collect::<Vec<u8>>());
        let shapes = FlxArchive::open(build_archive(&[raw_tiles(&[10]), raw_tiles(&[20, 21, 22]), statue, fountain])).unwrap();

        let palettes = FlxArchive::open(build_archive(&[ramp_palette()])).unwrap();
        let palette = Palette::decode(palettes.data(), palettes.record_range(0).unwrap().offset, ChannelScale::Shift).unwrap();

        // water and fountain are animated
        let attributes = TileAttributes::decode(&[0, 0, 0, 0b100, 0, 0, 0, 0, 0, 0b100, 0, 0]).unwrap();

        let chunks = Chunks::decode(&u16_table(2, |chunk, cell| match (chunk, cell) {
            (0, _) => shape_frame_key(GRASS, 0),
            (1, 0) => shape_frame_key(STATUE, 0),
            (1, _) => shape_frame_key(WATER, 0),
            _ => unreachable!(),
        })).unwrap();
        let map = WorldMap::decode(&u16_table(144, |region, cell| if region == 0 && cell == 1 { 1 } else { 0 })).unwrap();

        let data = WorldData { shapes, palettes, attributes, chunks, map };
        WorldModel::new(Arc::new(data), palette)
    }

    fn gray(index: u8) -> [u8; 4] {
        let v = (index % 64) << 2;
        [v, v, v, 255]
    }

    #[test]
    fn attributes_carry_frame_count() {
        let model = model();

        let water = model.shape_attributes(WATER as usize).unwrap();
        assert!(water.animated);
        assert_eq!(water.frame_count, 3);

        let statue = model.shape_attributes(STATUE as usize).unwrap();
        assert!(!statue.animated);
        assert_eq!(statue.frame_count, 1);

        assert_eq!(model.shape_attributes(FOUNTAIN as usize).unwrap().frame_count, 40);
        assert!(model.shape_attributes(4).is_err());
    }

    #[test]
    fn animated_shapes_follow_the_counter() {
        let model = model();
        let key = shape_frame_key(WATER, 1);

        assert_eq!(model.effective_key(key), key);
        model.advance_frame();
        assert_eq!(model.effective_key(key), shape_frame_key(WATER, 2));
        model.advance_frame();
        assert_eq!(model.effective_key(key), shape_frame_key(WATER, 0));

        // not animated
        assert_eq!(model.effective_key(shape_frame_key(GRASS, 0)), shape_frame_key(GRASS, 0));
    }

    #[test]
    fn long_animations_cycle_through_addressable_frames() {
        let model = model();
        let key = shape_frame_key(FOUNTAIN, 0);

        for counter in 0..80 {
            let effective = model.effective_key(key);
            assert_eq!(key_shape(effective), FOUNTAIN);
            assert_eq!(key_frame(effective) as usize, counter % 32);
            model.advance_frame();
        }

        // every shown frame is the one the key names
        let image = model.shape_frame(shape_frame_key(FOUNTAIN, 31)).unwrap();
        assert_eq!(image.pixel(0, 0), Some(31));
    }

    #[test]
    fn tick_animates_palette_and_frames() {
        let model = model();
        let before = model.read_palette().clone();

        model.tick();

        assert_eq!(model.frame_counter(), 1);
        let after = model.read_palette().clone();
        assert_eq!(after.color(224), before.color(231));
        assert_eq!(after.color(10), before.color(10));
    }

    #[test]
    fn view_is_composited_tile_by_tile() {
        let model = model();
        let mut fb = FrameBuffer::new();

        model.render_view(&mut fb, 0, 0);

        // grass in chunk (0, 0)
        assert_eq!(fb.pixel(0, 0), Some(gray(10)));
        assert_eq!(fb.pixel(127, 199), Some(gray(10)));

        // statue in cell (0, 0) of chunk (1, 0), its hotspot is at (135, 7)
        assert_eq!(fb.pixel(135, 6), Some(gray(30)));
        assert_eq!(fb.pixel(135, 7), Some(gray(31)));
        // the statue reaches into the next cells, which were drawn after it
        assert_eq!(fb.pixel(137, 7), Some(gray(20)));
        assert_eq!(fb.pixel(144, 6), Some(gray(20)));
        // cell (0, 0) itself has no water under the statue
        assert_eq!(fb.pixel(128, 0), Some([0, 0, 0, 255]));
        assert_eq!(fb.pixel(134, 7), Some([0, 0, 0, 255]));

        // water tiles use frame 0 first
        assert_eq!(fb.pixel(140, 20), Some(gray(20)));

        // chunk (2, 0) is grass again
        assert_eq!(fb.pixel(256, 0), Some(gray(10)));
    }

    #[test]
    fn view_changes_after_tick() {
        let model = model();
        let mut fb = FrameBuffer::new();

        model.tick();
        model.render_view(&mut fb, 0, 0);
        assert_eq!(fb.pixel(140, 20), Some(gray(21)));

        // cached frames are reused
        let cached = model.cache().len();
        model.render_view(&mut fb, 0, 0);
        assert_eq!(model.cache().len(), cached);
    }

    #[test]
    fn view_with_offset_and_wrapping() {
        let model = model();
        let mut fb = FrameBuffer::new();

        // one tile left of the world origin wraps to the last chunk column
        model.render_view(&mut fb, -1, 0);
        assert_eq!(fb.pixel(0, 0), Some(gray(10)));
        assert_eq!(fb.pixel(143, 6), Some(gray(30)));
    }

    #[test]
    fn single_shape_is_centered() {
        let model = model();
        let mut fb = FrameBuffer::new();

        assert!(model.render_shape(&mut fb, STATUE, 0));
        // box (0, -1, 9, 0) is drawn with its hotspot at (156, 100)
        assert_eq!(fb.pixel(156, 99), Some(gray(30)));
        assert_eq!(fb.pixel(165, 100), Some(gray(31)));
        assert_eq!(fb.pixel(166, 100), Some([0, 0, 0, 255]));

        assert!(!model.render_shape(&mut fb, 40, 0));
        assert_eq!(fb.pixel(156, 99), Some([0, 0, 0, 255]));
    }
}
