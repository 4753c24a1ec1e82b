//! Chunk command handler.
//!
//! Batch mode prints one `ChunkResult` JSON document. Streaming mode prints
//! one chunk per line as it is produced.

use anyhow::{bail, Context};
use clap::Args;
use mdchunk_core::config::AppConfig;
use mdchunk_engine::{
    chunk_stream, ChunkConfig, ChunkPipeline, StrategyId, StreamingConfig, ValidatorOptions,
};
use std::io::{self, Write};
use std::path::PathBuf;

use super::input::{loaded_config, open_reader, read_bytes};

/// Split a Markdown document into chunks
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// Input file, or `-` for stdin
    pub path: PathBuf,

    /// Force a strategy (code_aware, structural, fallback)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Maximum chunk size in characters
    #[arg(long)]
    pub max_size: Option<usize>,

    /// Minimum chunk size in characters
    #[arg(long)]
    pub min_size: Option<usize>,

    /// Overlap context size in characters (0 disables overlap)
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Treat content before the first header as a regular section
    #[arg(long)]
    pub no_preamble: bool,

    /// Process the input in bounded memory and print JSON lines
    #[arg(long)]
    pub stream: bool,

    /// Streaming buffer size in characters
    #[arg(long, requires = "stream")]
    pub buffer_size: Option<usize>,

    /// Run the optional overlap and table checks and fail on any error
    #[arg(long, conflicts_with = "stream")]
    pub strict: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "stream")]
    pub pretty: bool,
}

impl ChunkCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing chunk command for {}", self.path.display());
        tracing::debug!("Chunk options: {:?}", self);

        let loaded = loaded_config(config)?;
        let chunking = self.apply_overrides(loaded.chunking)?;

        if self.stream {
            let mut streaming = loaded.streaming;
            if let Some(buffer_size) = self.buffer_size {
                streaming.buffer_size = buffer_size;
            }
            self.run_stream(chunking, streaming)
        } else {
            self.run_batch(chunking)
        }
    }

    /// Flags win over the config file.
    fn apply_overrides(&self, mut chunking: ChunkConfig) -> anyhow::Result<ChunkConfig> {
        if let Some(strategy) = &self.strategy {
            chunking.strategy_override = Some(strategy.parse::<StrategyId>()?);
        }
        if let Some(max) = self.max_size {
            chunking.max_chunk_size = max;
        }
        if let Some(min) = self.min_size {
            chunking.min_chunk_size = min;
        }
        if let Some(overlap) = self.overlap {
            chunking.overlap_size = overlap;
        }
        if self.no_preamble {
            chunking.extract_preamble = false;
        }
        chunking.validate().context("Invalid chunking options")?;
        Ok(chunking)
    }

    fn run_batch(&self, chunking: ChunkConfig) -> anyhow::Result<()> {
        let mut pipeline = ChunkPipeline::new(chunking)?;
        if self.strict {
            pipeline = pipeline.with_validator_options(ValidatorOptions::strict());
        }

        let bytes = read_bytes(&self.path)?;
        let result = pipeline
            .process_bytes(&bytes)
            .with_context(|| format!("Failed to chunk {}", self.path.display()))?;

        tracing::info!(
            "Produced {} chunks with {} strategy",
            result.chunks.len(),
            result.strategy
        );
        for warning in &result.warnings {
            tracing::warn!("{}", warning);
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        if self.pretty {
            serde_json::to_writer_pretty(&mut out, &result)?;
        } else {
            serde_json::to_writer(&mut out, &result)?;
        }
        writeln!(out)?;

        if self.strict && !result.is_valid() {
            bail!(
                "Validation failed with {} error(s): {}",
                result.errors.len(),
                result.errors[0]
            );
        }
        Ok(())
    }

    fn run_stream(&self, chunking: ChunkConfig, streaming: StreamingConfig) -> anyhow::Result<()> {
        let reader = open_reader(&self.path)?;
        let chunker = chunk_stream(reader, &chunking, &streaming)?;

        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut count = 0usize;
        for chunk in chunker {
            let chunk = chunk.with_context(|| format!("Failed to chunk {}", self.path.display()))?;
            serde_json::to_writer(&mut out, &chunk)?;
            writeln!(out)?;
            count += 1;
        }
        out.flush()?;

        tracing::info!("Streamed {} chunks", count);
        Ok(())
    }
}
