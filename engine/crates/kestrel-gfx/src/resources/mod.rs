pub mod allocator;
pub mod buffer;
pub mod image;
