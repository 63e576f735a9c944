pub mod frame_commands;
pub mod frame_counter;
pub mod frame_sync;
pub mod renderer;
