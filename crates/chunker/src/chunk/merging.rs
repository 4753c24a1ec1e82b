//! Small-chunk merging.
//!
//! Undersized chunks that carry no structure of their own are folded into a
//! neighbour when the result stays within `max_chunk_size`. Chunks that can
//! be neither merged nor justified structurally are flagged `small_chunk`.

use std::collections::VecDeque;

use super::Chunk;
use crate::analysis::parse_header;
use crate::config::ChunkConfig;

const WEAK_MAX_CONTENT_LINES: usize = 3;
const WEAK_MAX_TEXT_CHARS: usize = 100;
const WEAK_MAX_PARAGRAPH_BREAKS: usize = 2;

/// A chunk too thin to stand alone: no level 2 or 3 header over real text,
/// fewer than three content lines, under 100 chars of non-header text and
/// fewer than two paragraph breaks.
pub(crate) fn is_structurally_weak(chunk: &Chunk) -> bool {
    let mut content_lines = 0;
    let mut text_chars = 0;
    let mut section_header = false;

    for line in chunk.content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        content_lines += 1;
        match parse_header(line) {
            Some((2 | 3, _)) => section_header = true,
            Some(_) => {}
            None => text_chars += trimmed.chars().count(),
        }
    }

    let paragraph_breaks = chunk
        .content
        .lines()
        .collect::<Vec<_>>()
        .windows(2)
        .filter(|w| !w[0].trim().is_empty() && w[1].trim().is_empty())
        .count();

    !(section_header && text_chars > 0)
        && content_lines < WEAK_MAX_CONTENT_LINES
        && text_chars < WEAK_MAX_TEXT_CHARS
        && paragraph_breaks < WEAK_MAX_PARAGRAPH_BREAKS
}

/// Paths of the same section or of an ancestor/descendant section.
fn same_section(a: &str, b: &str) -> bool {
    let related = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || outer == "/")
    };
    related(a, b) || related(b, a)
}

/// Join two adjacent chunks, keeping the blank lines that separated them.
fn merge_pair(first: Chunk, second: Chunk) -> Chunk {
    let gap = second.start_line.saturating_sub(first.end_line);
    let separator = if gap == 0 { " ".to_string() } else { "\n".repeat(gap) };
    let content = format!("{}{}{}", first.content, separator, second.content);

    let mut merged = Chunk::new(
        content,
        first.start_line,
        first.end_line.max(second.end_line),
        first.metadata.strategy,
        first.metadata.header_path,
    );
    merged.metadata.fence_warning = first.metadata.fence_warning.or(second.metadata.fence_warning);
    merged
}

fn fits(a: &Chunk, b: &Chunk, config: &ChunkConfig) -> bool {
    !a.is_preamble()
        && !b.is_preamble()
        && !a.metadata.allow_oversize
        && !b.metadata.allow_oversize
        && a.size() + b.size() + 2 <= config.max_chunk_size
}

/// Merge two adjacent chunks that went through separate merge passes, when
/// either was left flagged `small_chunk` and the pair fits. Both chunks come
/// back unchanged otherwise.
///
/// The merged chunk keeps the outer overlap context of the pair and the
/// content type and language of the larger side.
pub(crate) fn merge_flagged_pair(
    previous: Chunk,
    next: Chunk,
    config: &ChunkConfig,
) -> Result<Chunk, (Chunk, Chunk)> {
    let flagged = previous.metadata.small_chunk || next.metadata.small_chunk;
    if !flagged || !fits(&previous, &next, config) {
        return Err((previous, next));
    }

    let dominant = if previous.size() >= next.size() { &previous } else { &next };
    let content_type = dominant.metadata.content_type;
    let language = dominant.metadata.language.clone();
    let previous_content = previous.metadata.previous_content.clone();
    let next_content = next.metadata.next_content.clone();

    let mut merged = merge_pair(previous, next);
    merged.metadata.content_type = content_type;
    merged.metadata.language = language;
    merged.metadata.previous_content = previous_content;
    merged.metadata.next_content = next_content;
    Ok(merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Previous,
    Next,
}

fn choose_target(
    chunk: &Chunk,
    previous: Option<&Chunk>,
    next: Option<&Chunk>,
    config: &ChunkConfig,
) -> Option<Target> {
    let path = chunk.metadata.header_path.as_str();
    let prev_ok = previous.filter(|p| fits(p, chunk, config));
    let next_ok = next.filter(|n| fits(chunk, n, config));

    if prev_ok.is_some_and(|p| same_section(&p.metadata.header_path, path)) {
        return Some(Target::Previous);
    }
    if next_ok.is_some_and(|n| same_section(path, &n.metadata.header_path)) {
        return Some(Target::Next);
    }
    if prev_ok.is_some() {
        return Some(Target::Previous);
    }
    next_ok.map(|_| Target::Next)
}

/// Merge weak undersized chunks into neighbours; flag those that cannot be.
pub(crate) fn merge_small_chunks(chunks: Vec<Chunk>, config: &ChunkConfig) -> Vec<Chunk> {
    let mut queue: VecDeque<Chunk> = chunks.into();
    let mut out: Vec<Chunk> = Vec::with_capacity(queue.len());
    let mut merged_count = 0usize;

    while let Some(chunk) = queue.pop_front() {
        let candidate = chunk.size() < config.min_chunk_size
            && !chunk.is_preamble()
            && !chunk.metadata.allow_oversize
            && is_structurally_weak(&chunk);

        if !candidate {
            out.push(chunk);
            continue;
        }

        match choose_target(&chunk, out.last(), queue.front(), config) {
            Some(Target::Previous) => {
                if let Some(previous) = out.pop() {
                    out.push(merge_pair(previous, chunk));
                    merged_count += 1;
                }
            }
            Some(Target::Next) => {
                if let Some(next) = queue.pop_front() {
                    queue.push_front(merge_pair(chunk, next));
                    merged_count += 1;
                }
            }
            None => {
                let mut chunk = chunk;
                chunk.metadata.small_chunk = true;
                chunk.metadata.small_chunk_reason = Some("cannot_merge".to_string());
                out.push(chunk);
            }
        }
    }

    if merged_count > 0 {
        tracing::debug!("Merged {} small chunks", merged_count);
    }

    out
}
