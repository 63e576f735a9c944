pub mod collector;
pub mod culling;
pub mod entity;
pub mod render_set;
