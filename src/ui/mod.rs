pub mod viewer;

pub use viewer::run_app;
