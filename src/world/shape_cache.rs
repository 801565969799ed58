use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use log::{debug, warn};

use crate::flx::FlxArchive;
use crate::flx::chunkdata::{key_frame, key_shape};
use crate::render::IndexedImage;

// `None` is the one canonical entry for frames that cannot be displayed
type FrameCache = HashMap<u16, Option<Arc<IndexedImage>>>;
type FrameCacheLock = RwLock<FrameCache>;
type WriteCache<'a> = RwLockWriteGuard<'a, FrameCache>;
type ReadCache<'a> = RwLockReadGuard<'a, FrameCache>;

/// ShapeCache memoizes decoded frames by their shape-frame key.
/// Failed or oversized frames are remembered as missing and never decoded twice.
pub struct ShapeCache {
    frames: FrameCacheLock,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    fn write_cache(&self) -> WriteCache {
        self.frames.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn read_cache(&self) -> ReadCache {
        self.frames.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// returns the decoded frame for `key`, decoding it from `shapes` on the first request
    pub fn get_shape_frame(&self, shapes: &FlxArchive, key: u16) -> Option<Arc<IndexedImage>> {
        if let Some(entry) = self.read_cache().get(&key) {
            return entry.clone();
        }

        let (shape, frame) = (key_shape(key), key_frame(key));
        debug!("ShapeCache miss for shape {shape} frame {frame}");

        let image = match shapes.shape_frame(shape as usize, frame as usize) {
            Ok(decoded) => decoded.image.map(Arc::new),
            Err(err) => {
                warn!("shape {shape} frame {frame} cannot be decoded: {err}");
                None
            }
        };

        // another reader may have decoded the same frame in the meantime, keep the first one
        self.write_cache().entry(key).or_insert(image).clone()
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    pub fn clear(&self) {
        self.write_cache().clear();
    }
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new()
    }
}
