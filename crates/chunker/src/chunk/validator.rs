//! Post-hoc checks over a final chunk list.
//!
//! Violations are reported, never raised; the caller decides whether to trust
//! the chunks.

use serde::{Deserialize, Serialize};

use super::Chunk;
use crate::analysis::{analyze_with, count_fence_markers, BlockElement};
use crate::config::ChunkConfig;

/// Completeness ratio below which content loss is an error.
const COMPLETENESS_ERROR: f64 = 0.95;
/// Completeness ratio below which content loss is a warning.
const COMPLETENESS_WARNING: f64 = 0.99;
/// Ratio above which chunk content likely duplicates source text.
const DUPLICATION_WARNING: f64 = 1.05;

/// Optional stricter checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOptions {
    /// `previous_content` must be a suffix of the previous chunk and
    /// `next_content` a prefix of the next
    pub check_overlap: bool,

    /// Every table must lie wholly within one chunk
    pub check_tables: bool,
}

impl ValidatorOptions {
    pub fn strict() -> Self {
        Self {
            check_overlap: true,
            check_tables: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Name of the failed check
    pub check: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl ValidationIssue {
    pub fn new(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            chunk_index: None,
        }
    }

    pub fn at(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chunk_index {
            Some(idx) => write!(f, "[{}] chunk {}: {}", self.check, idx, self.message),
            None => write!(f, "[{}] {}", self.check, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }
}

fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Check chunk invariants against the source text.
pub fn validate(
    chunks: &[Chunk],
    config: &ChunkConfig,
    original_text: &str,
    options: &ValidatorOptions,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_completeness(chunks, original_text, &mut report);

    for (idx, chunk) in chunks.iter().enumerate() {
        if chunk.content.trim().is_empty() {
            report.error(ValidationIssue::new("empty_content", "chunk has no content").at(idx));
        }

        if chunk.start_line < 1 || chunk.end_line < chunk.start_line {
            report.error(
                ValidationIssue::new(
                    "line_range",
                    format!("invalid line range {}-{}", chunk.start_line, chunk.end_line),
                )
                .at(idx),
            );
        }

        if chunk.size() > config.max_chunk_size && !chunk.metadata.allow_oversize {
            report.error(
                ValidationIssue::new(
                    "size_bounds",
                    format!(
                        "{} chars exceeds max_chunk_size {} without oversize flag",
                        chunk.size(),
                        config.max_chunk_size
                    ),
                )
                .at(idx),
            );
        }

        if idx > 0 && chunks[idx - 1].start_line > chunk.start_line {
            report.error(
                ValidationIssue::new(
                    "ordering",
                    format!(
                        "start_line {} precedes previous start_line {}",
                        chunk.start_line,
                        chunks[idx - 1].start_line
                    ),
                )
                .at(idx),
            );
        }
    }

    check_fence_balance(chunks, original_text, &mut report);

    if options.check_overlap {
        check_overlap(chunks, &mut report);
    }

    if options.check_tables {
        check_tables(chunks, original_text, config, &mut report);
    }

    report
}

fn check_completeness(chunks: &[Chunk], original_text: &str, report: &mut ValidationReport) {
    let original = non_whitespace_chars(original_text);
    if original == 0 {
        return;
    }

    let reconstructed: usize = chunks.iter().map(|c| non_whitespace_chars(&c.content)).sum();
    let ratio = reconstructed as f64 / original as f64;
    let message = format!(
        "chunks hold {} of {} non-whitespace chars ({:.1}%)",
        reconstructed,
        original,
        ratio * 100.0
    );

    if ratio < COMPLETENESS_ERROR {
        report.error(ValidationIssue::new("content_completeness", message));
    } else if ratio < COMPLETENESS_WARNING {
        report.warn(ValidationIssue::new("content_completeness", message));
    } else if ratio > DUPLICATION_WARNING {
        report.warn(ValidationIssue::new("content_duplication", message));
    }
}

/// An odd marker count is an error unless the source itself leaves a fence open.
fn check_fence_balance(chunks: &[Chunk], original_text: &str, report: &mut ValidationReport) {
    let source_unbalanced = count_fence_markers(original_text) % 2 == 1;

    for (idx, chunk) in chunks.iter().enumerate() {
        let markers = count_fence_markers(&chunk.content);
        if markers % 2 == 0 {
            continue;
        }
        let issue = ValidationIssue::new(
            "fence_balance",
            format!("{} fence markers in chunk", markers),
        )
        .at(idx);
        if source_unbalanced {
            report.warn(issue);
        } else {
            report.error(issue);
        }
    }
}

fn check_overlap(chunks: &[Chunk], report: &mut ValidationReport) {
    for (idx, chunk) in chunks.iter().enumerate() {
        if let Some(previous) = &chunk.metadata.previous_content {
            let consistent = idx > 0 && chunks[idx - 1].content.ends_with(previous.as_str());
            if !consistent {
                report.error(
                    ValidationIssue::new(
                        "overlap_consistency",
                        "previous_content is not a suffix of the previous chunk",
                    )
                    .at(idx),
                );
            }
        }

        if let Some(next) = &chunk.metadata.next_content {
            let consistent = chunks
                .get(idx + 1)
                .is_some_and(|n| n.content.starts_with(next.as_str()));
            if !consistent {
                report.error(
                    ValidationIssue::new(
                        "overlap_consistency",
                        "next_content is not a prefix of the next chunk",
                    )
                    .at(idx),
                );
            }
        }
    }
}

fn check_tables(
    chunks: &[Chunk],
    original_text: &str,
    config: &ChunkConfig,
    report: &mut ValidationReport,
) {
    let Ok(analysis) = analyze_with(original_text, &config.analysis) else {
        return;
    };

    for element in &analysis.elements {
        let BlockElement::Table {
            start_line,
            end_line,
            ..
        } = element
        else {
            continue;
        };

        let containing = chunks
            .iter()
            .filter(|c| c.start_line <= *start_line && c.end_line >= *end_line)
            .count();
        if containing != 1 {
            report.error(ValidationIssue::new(
                "table_containment",
                format!(
                    "table at lines {}-{} is contained in {} chunks",
                    start_line, end_line, containing
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{OversizeReason, StrategyId};

    fn chunk(content: &str, start: usize, end: usize) -> Chunk {
        Chunk::new(content.to_string(), start, end, StrategyId::Fallback, "/".to_string())
    }

    #[test]
    fn test_valid_chunks() {
        let text = "first para\n\nsecond para";
        let chunks = vec![chunk("first para", 1, 1), chunk("second para", 3, 3)];
        let report = validate(&chunks, &ChunkConfig::default(), text, &ValidatorOptions::strict());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_content_loss_is_error() {
        let text = "first para\n\nsecond para that went missing";
        let chunks = vec![chunk("first para", 1, 1)];
        let report = validate(&chunks, &ChunkConfig::default(), text, &ValidatorOptions::default());
        assert!(report.errors.iter().any(|e| e.check == "content_completeness"));
    }

    #[test]
    fn test_oversize_needs_flag() {
        let config = ChunkConfig {
            max_chunk_size: 10,
            min_chunk_size: 2,
            overlap_size: 0,
            ..Default::default()
        };
        let text = "0123456789abcdef";
        let mut chunks = vec![chunk(text, 1, 1)];
        let report = validate(&chunks, &config, text, &ValidatorOptions::default());
        assert!(report.errors.iter().any(|e| e.check == "size_bounds"));

        chunks[0].flag_oversize(OversizeReason::SectionIntegrity);
        let report = validate(&chunks, &config, text, &ValidatorOptions::default());
        assert!(report.is_valid());
    }

    #[test]
    fn test_ordering_and_line_ranges() {
        let text = "a\nb";
        let chunks = vec![chunk("b", 2, 2), chunk("a", 1, 1), chunk("c", 3, 2)];
        let report = validate(&chunks, &ChunkConfig::default(), text, &ValidatorOptions::default());
        assert!(report.errors.iter().any(|e| e.check == "ordering"));
        assert!(report.errors.iter().any(|e| e.check == "line_range"));
    }

    #[test]
    fn test_fence_balance_relative_to_source() {
        let balanced = "```\ncode\n```";
        let chunks = vec![chunk("```\ncode", 1, 2), chunk("```", 3, 3)];
        let report = validate(&chunks, &ChunkConfig::default(), balanced, &ValidatorOptions::default());
        assert!(report.errors.iter().any(|e| e.check == "fence_balance"));

        let unclosed = "```\ncode";
        let chunks = vec![chunk(unclosed, 1, 2)];
        let report = validate(&chunks, &ChunkConfig::default(), unclosed, &ValidatorOptions::default());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.check == "fence_balance"));
    }

    #[test]
    fn test_overlap_consistency() {
        let text = "one two\n\nthree four";
        let mut chunks = vec![chunk("one two", 1, 1), chunk("three four", 3, 3)];
        chunks[1].metadata.previous_content = Some("not a suffix".to_string());
        let report = validate(&chunks, &ChunkConfig::default(), text, &ValidatorOptions::strict());
        assert!(report.errors.iter().any(|e| e.check == "overlap_consistency"));
    }

    #[test]
    fn test_table_containment() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 |";
        let split = vec![chunk("| a | b |\n|---|---|", 1, 2), chunk("| 1 | 2 |", 3, 3)];
        let report = validate(&split, &ChunkConfig::default(), text, &ValidatorOptions::strict());
        assert!(report.errors.iter().any(|e| e.check == "table_containment"));

        let whole = vec![chunk(text, 1, 3)];
        let report = validate(&whole, &ChunkConfig::default(), text, &ValidatorOptions::strict());
        assert!(report.is_valid());
    }
}
