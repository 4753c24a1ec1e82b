//! Structural and content analysis of Markdown text.
//!
//! `analyze` normalizes line endings, extracts the block elements, and
//! computes the metrics that drive strategy selection:
//! - content ratios (code, text, list, table)
//! - element counts and header levels
//! - complexity score
//! - code language histogram
//! - preamble (text before the first header)
//!
//! The resulting `ContentAnalysis` is immutable. Both the batch and the
//! streaming paths use this single implementation.

mod elements;
pub mod fence;
mod metrics;
mod preamble;

pub use elements::{
    indent_width, is_table_row, is_table_separator, is_table_start, list_marker, parse_header,
    BlockElement, LineKind,
};
pub use fence::{contains_fence, count_fence_markers, FenceEvent, FenceMarker, FenceTracker};
pub use metrics::{classify, complexity_score, ContentRatios, ContentType};
pub use preamble::{classify_preamble, Preamble, PreambleType};

use mdchunk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{AnalysisConfig, MAX_INPUT_BYTES};

/// Metrics and elements of one document (or one streaming window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub total_chars: usize,
    pub total_lines: usize,
    pub total_words: usize,

    pub code_ratio: f64,
    pub text_ratio: f64,
    pub list_ratio: f64,
    pub table_ratio: f64,

    pub code_block_count: usize,
    pub header_count: usize,
    /// Header counts keyed by level (1-6)
    pub headers_by_level: BTreeMap<u8, usize>,
    pub list_count: usize,
    pub table_count: usize,
    pub inline_code_count: usize,

    pub max_header_depth: u8,
    pub max_list_depth: usize,
    pub complexity_score: f64,

    /// Fenced code block count per language tag
    pub languages: BTreeMap<String, usize>,

    /// Elements in document order
    pub elements: Vec<BlockElement>,

    pub preamble: Option<Preamble>,

    pub content_type: ContentType,

    /// Whether any fenced block runs unterminated to the end of the text
    pub has_unclosed_fence: bool,

    #[serde(skip)]
    line_kinds: Vec<LineKind>,

    #[serde(skip)]
    line_chars: Vec<usize>,
}

impl ContentAnalysis {
    pub fn ratios(&self) -> ContentRatios {
        ContentRatios {
            code: self.code_ratio,
            text: self.text_ratio,
            list: self.list_ratio,
            table: self.table_ratio,
        }
    }

    /// Headers as `(line, level, text)` in document order.
    pub fn headers(&self) -> impl Iterator<Item = (usize, u8, &str)> {
        self.elements.iter().filter_map(|e| match e {
            BlockElement::Header {
                start_line,
                level,
                text,
            } => Some((*start_line, *level, text.as_str())),
            _ => None,
        })
    }

    /// Atomic elements (code blocks, tables) in document order.
    pub fn atomic_blocks(&self) -> impl Iterator<Item = &BlockElement> {
        self.elements.iter().filter(|e| e.is_atomic())
    }

    /// Kind of a 1-indexed line, `Blank` when out of range.
    pub fn line_kind(&self, line: usize) -> LineKind {
        line.checked_sub(1)
            .and_then(|idx| self.line_kinds.get(idx))
            .copied()
            .unwrap_or(LineKind::Blank)
    }

    /// Classify the inclusive 1-indexed line range with the document thresholds.
    pub fn classify_range(
        &self,
        start_line: usize,
        end_line: usize,
        config: &AnalysisConfig,
    ) -> ContentType {
        let start = start_line.saturating_sub(1).min(self.line_kinds.len());
        let end = end_line.min(self.line_kinds.len()).max(start);
        metrics::classify_lines(
            &self.line_kinds[start..end],
            &self.line_chars[start..end],
            config,
        )
    }

    /// Language of the single code block covering most of a line range.
    pub fn dominant_language(&self, start_line: usize, end_line: usize) -> Option<String> {
        let span = end_line.saturating_sub(start_line) + 1;
        self.elements.iter().find_map(|e| match e {
            BlockElement::CodeBlock {
                start_line: s,
                end_line: en,
                language: Some(language),
                ..
            } if *s >= start_line && *en <= end_line && (en - s + 1) * 2 >= span => {
                Some(language.clone())
            }
            _ => None,
        })
    }
}

/// Reject input that cannot be chunked at all.
pub fn validate_input(text: &str) -> AppResult<()> {
    if text.len() > MAX_INPUT_BYTES {
        return Err(AppError::InputValidation(format!(
            "input is {} bytes, limit is {} bytes",
            text.len(),
            MAX_INPUT_BYTES
        )));
    }

    if text.contains('\0') {
        return Err(AppError::InputValidation(
            "input contains NUL bytes and is not text".to_string(),
        ));
    }

    Ok(())
}

/// Decode raw bytes as UTF-8 text.
pub fn decode_input(bytes: &[u8]) -> AppResult<&str> {
    if bytes.len() > MAX_INPUT_BYTES {
        return Err(AppError::InputValidation(format!(
            "input is {} bytes, limit is {} bytes",
            bytes.len(),
            MAX_INPUT_BYTES
        )));
    }

    std::str::from_utf8(bytes).map_err(|e| {
        AppError::InputValidation(format!("input is not valid UTF-8: {}", e))
    })
}

/// Normalize `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Analyze a document with default analysis settings.
pub fn analyze(text: &str) -> AppResult<ContentAnalysis> {
    analyze_with(text, &AnalysisConfig::default())
}

/// Analyze a document.
///
/// Fails only on input rejected by [`validate_input`]; malformed Markdown
/// degrades to best-effort extraction.
pub fn analyze_with(text: &str, config: &AnalysisConfig) -> AppResult<ContentAnalysis> {
    validate_input(text)?;
    let normalized = normalize_line_endings(text);
    let lines: Vec<&str> = normalized.lines().collect();
    Ok(analyze_lines(&normalized, &lines, config))
}

/// Analyze already normalized text split into lines.
pub(crate) fn analyze_lines(text: &str, lines: &[&str], config: &AnalysisConfig) -> ContentAnalysis {
    let parsed = elements::parse_blocks(lines);
    let line_chars: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
    let ratios = ContentRatios::from_lines(&parsed.line_kinds, &line_chars);

    let mut headers_by_level = BTreeMap::new();
    let mut languages = BTreeMap::new();
    let mut code_block_count = 0;
    let mut list_count = 0;
    let mut table_count = 0;
    let mut max_header_depth = 0u8;
    let mut max_list_depth = 0usize;
    let mut first_header = None;
    let mut has_unclosed_fence = false;

    for element in &parsed.elements {
        match element {
            BlockElement::CodeBlock {
                language, closed, ..
            } => {
                code_block_count += 1;
                has_unclosed_fence |= !closed;
                let key = language.clone().unwrap_or_else(|| "unknown".to_string());
                *languages.entry(key).or_insert(0) += 1;
            }
            BlockElement::Header {
                start_line, level, ..
            } => {
                *headers_by_level.entry(*level).or_insert(0) += 1;
                max_header_depth = max_header_depth.max(*level);
                first_header.get_or_insert(start_line - 1);
            }
            BlockElement::ListBlock { max_depth, .. } => {
                list_count += 1;
                max_list_depth = max_list_depth.max(*max_depth);
            }
            BlockElement::Table { .. } => table_count += 1,
        }
    }

    let header_count = headers_by_level.values().sum();
    let complexity = complexity_score(max_header_depth, max_list_depth, &ratios, &config.weights);
    let content_type = classify(&ratios, &config.thresholds);
    let preamble = preamble::extract_preamble(lines, first_header);

    ContentAnalysis {
        total_chars: text.chars().count(),
        total_lines: lines.len(),
        total_words: text.unicode_words().count(),
        code_ratio: ratios.code,
        text_ratio: ratios.text,
        list_ratio: ratios.list,
        table_ratio: ratios.table,
        code_block_count,
        header_count,
        headers_by_level,
        list_count,
        table_count,
        inline_code_count: parsed.inline_code_count,
        max_header_depth,
        max_list_depth,
        complexity_score: complexity,
        languages,
        elements: parsed.elements,
        preamble,
        content_type,
        has_unclosed_fence,
        line_kinds: parsed.line_kinds,
        line_chars,
    }
}
