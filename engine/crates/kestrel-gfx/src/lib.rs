pub mod commands;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
