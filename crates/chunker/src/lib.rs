//! Markdown chunking engine.
//!
//! Splits a Markdown document into size-bounded chunks for retrieval
//! pipelines without breaking fenced code blocks, tables or list items.
//! Each chunk carries its header path, content type and optional overlap
//! context from its neighbours.
//!
//! ```no_run
//! use mdchunk_engine::{chunk, ChunkConfig};
//!
//! let result = chunk("# Title\n\nSome text.", &ChunkConfig::default())?;
//! for c in &result.chunks {
//!     println!("{} {}-{}", c.metadata.header_path, c.start_line, c.end_line);
//! }
//! # Ok::<(), mdchunk_core::AppError>(())
//! ```

pub mod analysis;
pub mod chunk;
pub mod config;
pub mod streaming;

#[cfg(test)]
mod tests;

pub use analysis::{analyze, analyze_with, ContentAnalysis, ContentType, PreambleType};
pub use chunk::{
    chunk, chunk_bytes, select_strategy, validate, Chunk, ChunkMetadata, ChunkPipeline,
    ChunkResult, OversizeReason, StrategyId, ValidationIssue, ValidationReport, ValidatorOptions,
};
pub use config::{load_config, parse_config, ChunkConfig, LoadedConfig, StreamingConfig};
pub use streaming::{chunk_stream, StreamingChunker};
