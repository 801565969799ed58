pub mod flxreader;
pub mod archive;
pub mod palette;
pub mod shapes;
pub mod tfa;
pub mod chunkdata;

#[cfg(test)]
pub(crate) mod fixtures;

/// byte range of a record inside its archive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlxSlice {
    pub offset: usize,
    pub length: usize,
}


pub use archive::FlxArchive;
pub use palette::{Palette, ChannelScale};
pub use shapes::{ShapeFrame, decode_shape_frame};
pub use tfa::{ShapeAttributes, TileAttributes, decode_attributes};
pub use chunkdata::{Chunks, WorldMap, shape_frame_key};
