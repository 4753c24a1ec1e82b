//! Chunk post-processing.
//!
//! Runs in a fixed order: fence balance, overlap context, ordering, oversize
//! flags. Chunk content is never modified here.

use super::validator::ValidationIssue;
use super::{Chunk, OversizeReason};
use crate::analysis::{contains_fence, count_fence_markers, is_table_start};
use crate::config::ChunkConfig;

pub struct PostProcessor<'a> {
    config: &'a ChunkConfig,
}

impl<'a> PostProcessor<'a> {
    pub fn new(config: &'a ChunkConfig) -> Self {
        Self { config }
    }

    /// Post-process chunks, appending non-fatal findings to `warnings`.
    pub fn process(&self, mut chunks: Vec<Chunk>, warnings: &mut Vec<ValidationIssue>) -> Vec<Chunk> {
        self.check_fences(&mut chunks, warnings);

        if self.config.overlap_size > 0 {
            compute_overlap(&mut chunks, self.config.overlap_size, None);
        }

        chunks.sort_by_key(|c| (c.start_line, c.end_line));

        self.flag_oversize(&mut chunks);
        chunks
    }

    fn check_fences(&self, chunks: &mut [Chunk], warnings: &mut Vec<ValidationIssue>) {
        for (idx, chunk) in chunks.iter_mut().enumerate() {
            let markers = count_fence_markers(&chunk.content);
            if markers % 2 == 1 {
                let message = format!(
                    "chunk at lines {}-{} has {} fence markers",
                    chunk.start_line, chunk.end_line, markers
                );
                tracing::warn!("{}", message);
                chunk.metadata.fence_warning = Some(message.clone());
                warnings.push(ValidationIssue::new("fence_balance", message).at(idx));
            }
        }
    }

    fn flag_oversize(&self, chunks: &mut [Chunk]) {
        for chunk in chunks.iter_mut() {
            if chunk.metadata.allow_oversize || chunk.size() <= self.config.max_chunk_size {
                continue;
            }
            let reason = infer_oversize_reason(&chunk.content);
            tracing::debug!(
                "Flagging oversize chunk at lines {}-{} ({} chars): {}",
                chunk.start_line,
                chunk.end_line,
                chunk.size(),
                reason.as_str()
            );
            chunk.flag_oversize(reason);
        }
    }
}

fn infer_oversize_reason(content: &str) -> OversizeReason {
    if contains_fence(content) {
        return OversizeReason::CodeBlockIntegrity;
    }
    let lines: Vec<&str> = content.lines().collect();
    if (0..lines.len()).any(|i| is_table_start(&lines, i)) {
        return OversizeReason::TableIntegrity;
    }
    OversizeReason::SectionIntegrity
}

/// Set `previous_content` / `next_content` on each chunk from its neighbours.
///
/// Context is at most `max_chars` characters, and at most `max_lines` lines
/// when given. It is an exact suffix (prefix) of the neighbour's content,
/// trimmed to a whitespace boundary when possible.
pub fn compute_overlap(chunks: &mut [Chunk], max_chars: usize, max_lines: Option<usize>) {
    let contexts: Vec<(Option<String>, Option<String>)> = (0..chunks.len())
        .map(|i| {
            let previous = i
                .checked_sub(1)
                .map(|p| overlap_suffix(&chunks[p].content, max_chars, max_lines))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let next = chunks
                .get(i + 1)
                .map(|n| overlap_prefix(&n.content, max_chars, max_lines))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            (previous, next)
        })
        .collect();

    for (chunk, (previous, next)) in chunks.iter_mut().zip(contexts) {
        chunk.metadata.previous_content = previous;
        chunk.metadata.next_content = next;
    }
}

/// Trailing context of `text`.
pub(crate) fn overlap_suffix(text: &str, max_chars: usize, max_lines: Option<usize>) -> &str {
    let char_count = text.chars().count();
    let mut start = if char_count <= max_chars {
        0
    } else {
        text.char_indices()
            .nth(char_count - max_chars)
            .map_or(0, |(idx, _)| idx)
    };

    // Drop a partial leading word.
    if start > 0 && !text[..start].ends_with(char::is_whitespace) {
        if let Some(ws) = text[start..].find(char::is_whitespace) {
            if !text[start + ws..].trim().is_empty() {
                start += ws;
            }
        }
    }

    if let Some(limit) = max_lines {
        if limit == 0 {
            return "";
        }
        let line_start = text
            .rmatch_indices('\n')
            .nth(limit - 1)
            .map_or(0, |(idx, _)| idx + 1);
        start = start.max(line_start);
    }

    text[start..].trim_start()
}

/// Leading context of `text`.
pub(crate) fn overlap_prefix(text: &str, max_chars: usize, max_lines: Option<usize>) -> &str {
    let mut end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);

    // Drop a partial trailing word.
    if end < text.len() && !text[end..].starts_with(char::is_whitespace) {
        if let Some(ws) = text[..end].rfind(char::is_whitespace) {
            if !text[..ws].trim().is_empty() {
                end = ws;
            }
        }
    }

    if let Some(limit) = max_lines {
        if limit == 0 {
            return "";
        }
        if let Some((idx, _)) = text.match_indices('\n').nth(limit - 1) {
            end = end.min(idx);
        }
    }

    text[..end].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::StrategyId;

    fn chunk(content: &str, start: usize, end: usize) -> Chunk {
        Chunk::new(content.to_string(), start, end, StrategyId::Fallback, "/".to_string())
    }

    #[test]
    fn test_overlap_is_exact_suffix_and_prefix() {
        let mut chunks = vec![
            chunk("alpha beta gamma delta epsilon", 1, 1),
            chunk("zeta eta theta iota kappa", 3, 3),
        ];
        compute_overlap(&mut chunks, 12, None);

        let previous = chunks[1].metadata.previous_content.clone().unwrap();
        assert!(chunks[0].content.ends_with(&previous));
        assert!(previous.chars().count() <= 12);
        assert_eq!(previous, "epsilon");

        let next = chunks[0].metadata.next_content.clone().unwrap();
        assert!(chunks[1].content.starts_with(&next));
        assert_eq!(next, "zeta eta");

        assert!(chunks[0].metadata.previous_content.is_none());
        assert!(chunks[1].metadata.next_content.is_none());
    }

    #[test]
    fn test_overlap_line_limit() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(overlap_suffix(text, 100, Some(2)), "three\nfour");
        assert_eq!(overlap_prefix(text, 100, Some(2)), "one\ntwo");
        assert_eq!(overlap_suffix(text, 100, Some(0)), "");
    }

    #[test]
    fn test_overlap_multibyte_safe() {
        let text = "héllo wörld ünïcode";
        let suffix = overlap_suffix(text, 9, None);
        assert!(text.ends_with(suffix));
        let prefix = overlap_prefix(text, 9, None);
        assert!(text.starts_with(prefix));
    }

    #[test]
    fn test_process_sorts_and_flags() {
        let config = ChunkConfig {
            max_chunk_size: 20,
            min_chunk_size: 5,
            overlap_size: 0,
            ..Default::default()
        };
        let chunks = vec![
            chunk("| a | b |\n|---|---|\n| 1 | 2 |", 5, 7),
            chunk("short", 1, 1),
            chunk("```\nlong code line here\n```", 9, 11),
        ];

        let mut warnings = Vec::new();
        let out = PostProcessor::new(&config).process(chunks, &mut warnings);

        assert_eq!(out[0].start_line, 1);
        assert_eq!(out[1].metadata.oversize_reason, Some(OversizeReason::TableIntegrity));
        assert_eq!(out[2].metadata.oversize_reason, Some(OversizeReason::CodeBlockIntegrity));
        assert!(!out[0].metadata.allow_oversize);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_odd_fence_recorded() {
        let config = ChunkConfig::default();
        let mut warnings = Vec::new();
        let out = PostProcessor::new(&config).process(vec![chunk("```\nunclosed", 1, 2)], &mut warnings);

        assert!(out[0].metadata.fence_warning.is_some());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].check, "fence_balance");
    }
}
