pub mod attachment;
pub mod chain;
pub mod graph;
pub mod pass;
