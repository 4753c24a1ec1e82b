//! Chunk construction for Markdown documents.
//!
//! This module provides the chunking engine that:
//! - Selects a strategy from the document analysis
//! - Builds chunks with the code-aware, structural or fallback strategy
//! - Merges weak undersized chunks into neighbours
//! - Post-processes chunks (fence balance, overlap, ordering, oversize flags)
//! - Validates the final chunk list

mod merging;
mod metadata;
mod pipeline;
mod postprocess;
mod selector;
pub mod strategies;
mod validator;

pub use metadata::{calculate_hash, HeaderIndex, HeaderTrail, PREAMBLE_PATH, ROOT_PATH};
pub use pipeline::{chunk, chunk_bytes, ChunkPipeline, ChunkResult};
pub use postprocess::{compute_overlap, PostProcessor};
pub use selector::select_strategy;
pub use strategies::StrategyId;
pub use validator::{validate, ValidationIssue, ValidationReport, ValidatorOptions};

pub(crate) use merging::{merge_flagged_pair, merge_small_chunks};
pub(crate) use postprocess::{overlap_prefix, overlap_suffix};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::{ContentType, PreambleType};

/// A contiguous span of the source document plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text; never empty, never mutated after creation
    pub content: String,

    /// First source line (1-indexed)
    pub start_line: usize,

    /// Last source line (1-indexed, inclusive)
    pub end_line: usize,

    pub metadata: ChunkMetadata,
}

/// Why a chunk is allowed to exceed `max_chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizeReason {
    CodeBlockIntegrity,
    TableIntegrity,
    SectionIntegrity,
}

impl OversizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeBlockIntegrity => "code_block_integrity",
            Self::TableIntegrity => "table_integrity",
            Self::SectionIntegrity => "section_integrity",
        }
    }
}

/// Fixed-schema chunk metadata.
///
/// Optional fields are omitted from serialized output when unset.
/// `extra` is an open extension map; nothing in the engine reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Strategy that produced the chunk
    pub strategy: StrategyId,

    /// Classification of the chunk's own lines
    pub content_type: ContentType,

    /// Slash-joined ancestor headers, `/` at document root
    pub header_path: String,

    /// SHA-256 of `content`
    pub content_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_oversize: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oversize_reason: Option<OversizeReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_content: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub small_chunk: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_chunk_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble_type: Option<PreambleType>,

    /// Set when the chunk has an odd number of fence markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence_warning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_window_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_chunk_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cross_window: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create a chunk with required metadata; content type defaults to `primary`
    /// until the pipeline classifies the chunk's line range.
    pub fn new(
        content: String,
        start_line: usize,
        end_line: usize,
        strategy: StrategyId,
        header_path: String,
    ) -> Self {
        let content_hash = calculate_hash(&content);

        Self {
            content,
            start_line,
            end_line,
            metadata: ChunkMetadata {
                strategy,
                content_type: ContentType::Primary,
                header_path,
                content_hash,
                language: None,
                allow_oversize: false,
                oversize_reason: None,
                previous_content: None,
                next_content: None,
                small_chunk: false,
                small_chunk_reason: None,
                preamble_type: None,
                fence_warning: None,
                stream_window_index: None,
                stream_chunk_index: None,
                is_cross_window: None,
                extra: BTreeMap::new(),
            },
        }
    }

    /// Size in characters.
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Mark the chunk as intentionally oversized.
    pub fn flag_oversize(&mut self, reason: OversizeReason) {
        self.metadata.allow_oversize = true;
        self.metadata.oversize_reason = Some(reason);
    }

    pub fn is_preamble(&self) -> bool {
        self.metadata.header_path == PREAMBLE_PATH
    }
}

/// Join `lines[start..=end]` (0-based) into chunk content without blank edges.
///
/// Returns `None` when the range holds only whitespace; otherwise the trimmed
/// content and the 1-indexed line range it actually covers.
pub(crate) fn render_lines(
    lines: &[&str],
    start: usize,
    end: usize,
) -> Option<(String, usize, usize)> {
    if start > end || end >= lines.len() {
        return None;
    }

    let first = (start..=end).find(|&i| !lines[i].trim().is_empty())?;
    let last = (start..=end).rev().find(|&i| !lines[i].trim().is_empty())?;

    Some((lines[first..=last].join("\n"), first + 1, last + 1))
}
