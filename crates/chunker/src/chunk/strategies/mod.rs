//! Chunking strategies.
//!
//! The set of strategies is closed: `StrategyId` names each one and
//! dispatches to its implementation. Every strategy covers the whole
//! document with ordered chunks and never splits a fenced code block.

mod code;
mod fallback;
mod structural;
pub(crate) mod units;

pub use code::CodeAwareStrategy;
pub use fallback::FallbackStrategy;
pub use structural::StructuralStrategy;

use mdchunk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use text_splitter::TextSplitter;

use super::{render_lines, Chunk, HeaderIndex};
use crate::analysis::ContentAnalysis;
use crate::config::ChunkConfig;

/// Identifier of a chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    CodeAware,
    Structural,
    Fallback,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeAware => "code_aware",
            Self::Structural => "structural",
            Self::Fallback => "fallback",
        }
    }

    /// Run the strategy and check its output covers the document sanely.
    pub fn apply(self, ctx: &StrategyContext<'_>) -> AppResult<Vec<Chunk>> {
        let chunks = match self {
            Self::CodeAware => CodeAwareStrategy.apply(ctx)?,
            Self::Structural => StructuralStrategy.apply(ctx)?,
            Self::Fallback => FallbackStrategy.apply(ctx)?,
        };

        if chunks.is_empty() && !ctx.text.trim().is_empty() {
            return Err(AppError::strategy(
                self.as_str(),
                "no chunks produced for non-empty input",
            ));
        }

        if let Some(bad) = chunks
            .iter()
            .find(|c| c.start_line == 0 || c.end_line < c.start_line || c.content.trim().is_empty())
        {
            return Err(AppError::strategy(
                self.as_str(),
                format!(
                    "invalid chunk at lines {}-{}",
                    bad.start_line, bad.end_line
                ),
            ));
        }

        tracing::debug!(
            "Strategy {} created {} chunks from {} lines",
            self,
            chunks.len(),
            ctx.lines.len()
        );

        Ok(chunks)
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "code_aware" | "code" => Ok(Self::CodeAware),
            "structural" | "structure" => Ok(Self::Structural),
            "fallback" | "paragraph" => Ok(Self::Fallback),
            other => Err(AppError::Configuration(format!(
                "Unknown strategy: {}. Supported: code_aware, structural, fallback",
                other
            ))),
        }
    }
}

/// Everything a strategy reads. Text is already normalized.
pub struct StrategyContext<'a> {
    pub text: &'a str,
    pub lines: &'a [&'a str],
    pub analysis: &'a ContentAnalysis,
    pub config: &'a ChunkConfig,
    pub headers: &'a HeaderIndex,
}

/// Common strategy contract.
pub trait ChunkStrategy {
    /// Split the document into ordered chunks covering all of it.
    fn apply(&self, ctx: &StrategyContext<'_>) -> AppResult<Vec<Chunk>>;
}

/// Split a block of plain lines (0-based `start..=end`) that exceeds the
/// size limit at sentence and word boundaries.
///
/// Must only be called on text without fence markers.
pub(crate) fn split_text_block(
    ctx: &StrategyContext<'_>,
    start: usize,
    end: usize,
    strategy: StrategyId,
    header_path: &str,
) -> Vec<Chunk> {
    let text = ctx.lines[start..=end].join("\n");
    let splitter = TextSplitter::new(ctx.config.max_chunk_size);

    splitter
        .chunk_indices(&text)
        .filter(|(_, piece)| !piece.trim().is_empty())
        .map(|(offset, piece)| {
            let first = start + 1 + text[..offset].matches('\n').count();
            let last = first + piece.matches('\n').count();
            Chunk::new(
                piece.to_string(),
                first,
                last,
                strategy,
                header_path.to_string(),
            )
        })
        .collect()
}

/// Pack consecutive lines (0-based `start..=end`) into chunks up to the size
/// limit; lines longer than the limit are split by [`split_text_block`].
pub(crate) fn pack_lines(
    ctx: &StrategyContext<'_>,
    start: usize,
    end: usize,
    strategy: StrategyId,
    header_path: &str,
) -> Vec<Chunk> {
    let max = ctx.config.max_chunk_size;
    let mut chunks = Vec::new();
    let mut group_start: Option<usize> = None;
    let mut size = 0usize;

    let flush = |from: Option<usize>, to: usize, chunks: &mut Vec<Chunk>| {
        if let Some(from) = from {
            if let Some((content, s, e)) = render_lines(ctx.lines, from, to) {
                chunks.push(Chunk::new(content, s, e, strategy, header_path.to_string()));
            }
        }
    };

    for i in start..=end {
        let line_chars = ctx.lines[i].chars().count();

        if line_chars > max {
            if i > 0 {
                flush(group_start.take(), i - 1, &mut chunks);
            }
            size = 0;
            chunks.extend(split_text_block(ctx, i, i, strategy, header_path));
            continue;
        }

        let added = if group_start.is_some() { line_chars + 1 } else { line_chars };
        if group_start.is_some() && size + added > max {
            flush(group_start.take(), i - 1, &mut chunks);
            size = 0;
        }

        if group_start.is_none() {
            group_start = Some(i);
            size = line_chars;
        } else {
            size += added;
        }
    }

    flush(group_start, end, &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::chunk::HeaderTrail;

    #[test]
    fn test_strategy_id_parse() {
        assert_eq!("code-aware".parse::<StrategyId>().unwrap(), StrategyId::CodeAware);
        assert_eq!("Structural".parse::<StrategyId>().unwrap(), StrategyId::Structural);
        assert_eq!("fallback".parse::<StrategyId>().unwrap(), StrategyId::Fallback);
        assert!("semantic".parse::<StrategyId>().is_err());
    }

    #[test]
    fn test_strategy_id_serde_names() {
        assert_eq!(
            serde_json::to_string(&StrategyId::CodeAware).unwrap(),
            "\"code_aware\""
        );
        assert_eq!(StrategyId::Structural.to_string(), "structural");
    }

    #[test]
    fn test_pack_lines_respects_limit() {
        let text = (1..=40)
            .map(|i| format!("row {:02} of the table body", i))
            .collect::<Vec<_>>()
            .join("\n");
        let lines: Vec<&str> = text.lines().collect();
        let analysis = analyze(&text).unwrap();
        let config = ChunkConfig {
            max_chunk_size: 200,
            min_chunk_size: 50,
            overlap_size: 0,
            ..Default::default()
        };
        let headers = HeaderIndex::new(&analysis, &HeaderTrail::new());
        let ctx = StrategyContext {
            text: &text,
            lines: &lines,
            analysis: &analysis,
            config: &config,
            headers: &headers,
        };

        let chunks = pack_lines(&ctx, 0, lines.len() - 1, StrategyId::CodeAware, "/");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.size() <= 200));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, 40);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
    }

    #[test]
    fn test_split_text_block_long_line() {
        let text = "Sentence number one is here. ".repeat(40);
        let lines: Vec<&str> = text.lines().collect();
        let analysis = analyze(&text).unwrap();
        let config = ChunkConfig {
            max_chunk_size: 300,
            min_chunk_size: 50,
            overlap_size: 0,
            ..Default::default()
        };
        let headers = HeaderIndex::new(&analysis, &HeaderTrail::new());
        let ctx = StrategyContext {
            text: &text,
            lines: &lines,
            analysis: &analysis,
            config: &config,
            headers: &headers,
        };

        let chunks = split_text_block(&ctx, 0, 0, StrategyId::Fallback, "/");
        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| c.size() <= 300));
        assert!(chunks.iter().all(|c| c.start_line == 1 && c.end_line == 1));
    }
}
