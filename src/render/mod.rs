pub mod indexed_image;
pub mod framebuffer;

pub use indexed_image::{IndexedImage, TRANSPARENT_INDEX};
pub use framebuffer::{FrameBuffer, SCREEN_WIDTH, SCREEN_HEIGHT};
