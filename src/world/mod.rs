pub mod world_model;
pub mod shape_cache;

pub use world_model::{WorldData, WorldModel};

pub use shape_cache::ShapeCache;
