pub mod descriptor;
pub mod graphics_pipeline;
pub mod shader;
