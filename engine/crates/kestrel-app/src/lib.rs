pub mod app;
pub mod camera;
pub mod timer;
