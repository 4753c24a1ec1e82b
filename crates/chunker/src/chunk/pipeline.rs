//! Chunking pipeline orchestrator.

use mdchunk_core::AppResult;
use serde::Serialize;

use super::strategies::StrategyContext;
use super::{
    merge_small_chunks, select_strategy, validate, Chunk, HeaderIndex, HeaderTrail, PostProcessor,
    StrategyId, ValidationIssue, ValidatorOptions,
};
use crate::analysis::{analyze_lines, decode_input, normalize_line_endings, validate_input, ContentAnalysis};
use crate::config::ChunkConfig;

/// Chunks of one document together with how they were produced.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkResult {
    pub chunks: Vec<Chunk>,
    pub analysis: ContentAnalysis,
    /// Strategy that produced the chunks
    pub strategy: StrategyId,
    /// Whether the selected strategy failed and the fallback ran instead
    pub fallback_used: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ChunkResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Output of one streaming window.
pub(crate) struct WindowOutput {
    pub result: ChunkResult,
    /// Headers open at the end of the window
    pub trail_after: HeaderTrail,
}

/// Batch chunking pipeline.
#[derive(Debug, Clone)]
pub struct ChunkPipeline {
    config: ChunkConfig,
    validator: ValidatorOptions,
}

impl ChunkPipeline {
    /// Create a new pipeline; fails on invalid configuration.
    pub fn new(config: ChunkConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            validator: ValidatorOptions::default(),
        })
    }

    /// Enable the stricter validator checks.
    pub fn with_validator_options(mut self, options: ValidatorOptions) -> Self {
        self.validator = options;
        self
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Chunk a whole document.
    pub fn process(&self, text: &str) -> AppResult<ChunkResult> {
        validate_input(text)?;
        let output = self.run(text, None, &HeaderTrail::new())?;

        tracing::info!(
            "Chunking complete: {} chunks created from {} chars using {}",
            output.result.chunks.len(),
            output.result.analysis.total_chars,
            output.result.strategy
        );

        Ok(output.result)
    }

    /// Chunk raw bytes, rejecting anything that is not UTF-8 text.
    pub fn process_bytes(&self, bytes: &[u8]) -> AppResult<ChunkResult> {
        let text = decode_input(bytes)?;
        self.process(text)
    }

    /// Chunk one streaming window with a fixed strategy, continuing the
    /// header trail of the previous window.
    pub(crate) fn process_window(
        &self,
        text: &str,
        strategy: StrategyId,
        base: &HeaderTrail,
    ) -> AppResult<WindowOutput> {
        self.run(text, Some(strategy), base)
    }

    fn run(&self, text: &str, forced: Option<StrategyId>, base: &HeaderTrail) -> AppResult<WindowOutput> {
        let normalized = normalize_line_endings(text);
        let lines: Vec<&str> = normalized.lines().collect();
        let analysis = analyze_lines(&normalized, &lines, &self.config.analysis);
        let headers = HeaderIndex::new(&analysis, base);
        let strategy = forced.unwrap_or_else(|| select_strategy(&analysis, &self.config));

        if normalized.trim().is_empty() {
            return Ok(WindowOutput {
                trail_after: headers.trail_after().clone(),
                result: ChunkResult {
                    chunks: Vec::new(),
                    analysis,
                    strategy,
                    fallback_used: false,
                    errors: Vec::new(),
                    warnings: Vec::new(),
                },
            });
        }

        let ctx = StrategyContext {
            text: &normalized,
            lines: &lines,
            analysis: &analysis,
            config: &self.config,
            headers: &headers,
        };

        let mut warnings = Vec::new();
        let (chunks, strategy, fallback_used) = match strategy.apply(&ctx) {
            Ok(chunks) => (chunks, strategy, false),
            Err(e) => {
                tracing::warn!("Strategy {} failed, using fallback: {}", strategy, e);
                warnings.push(ValidationIssue::new("strategy_fallback", e.to_string()));
                (StrategyId::Fallback.apply(&ctx)?, StrategyId::Fallback, true)
            }
        };

        let mut chunks = merge_small_chunks(chunks, &self.config);
        for chunk in &mut chunks {
            chunk.metadata.content_type =
                analysis.classify_range(chunk.start_line, chunk.end_line, &self.config.analysis);
            chunk.metadata.language = analysis.dominant_language(chunk.start_line, chunk.end_line);
        }

        let chunks = PostProcessor::new(&self.config).process(chunks, &mut warnings);

        let report = validate(&chunks, &self.config, &normalized, &self.validator);
        for issue in &report.errors {
            tracing::warn!("Validation error: {}", issue);
        }
        warnings.extend(report.warnings);

        Ok(WindowOutput {
            trail_after: headers.trail_after().clone(),
            result: ChunkResult {
                chunks,
                analysis,
                strategy,
                fallback_used,
                errors: report.errors,
                warnings,
            },
        })
    }
}

/// Chunk a document with the given configuration.
pub fn chunk(text: &str, config: &ChunkConfig) -> AppResult<ChunkResult> {
    ChunkPipeline::new(config.clone())?.process(text)
}

/// Chunk raw bytes with the given configuration.
pub fn chunk_bytes(bytes: &[u8], config: &ChunkConfig) -> AppResult<ChunkResult> {
    ChunkPipeline::new(config.clone())?.process_bytes(bytes)
}
