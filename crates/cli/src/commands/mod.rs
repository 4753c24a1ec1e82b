//! Command handlers for the mdchunk CLI.

pub mod analyze;
pub mod chunk;
mod input;

pub use analyze::AnalyzeCommand;
pub use chunk::ChunkCommand;
