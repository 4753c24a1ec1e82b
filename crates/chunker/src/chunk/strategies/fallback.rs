//! Paragraph fallback strategy.
//!
//! Paragraphs are separated by blank lines outside fenced blocks. Only a
//! paragraph too large for one chunk is broken down further, into block
//! units, so atomic blocks and list items still stay whole.

use mdchunk_core::AppResult;

use super::units::{build_units, pack_units, PackOptions};
use super::{ChunkStrategy, StrategyContext, StrategyId};
use crate::analysis::FenceTracker;
use crate::chunk::{render_lines, Chunk};

/// Groups blank-line separated paragraphs up to `max_chunk_size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackStrategy;

/// Paragraph spans (0-based, inclusive) with blank lines inside fences kept.
fn paragraphs(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut tracker = FenceTracker::new();
    let mut current: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let was_in_fence = tracker.in_fence();
        tracker.feed_line(line);

        if line.trim().is_empty() && !was_in_fence {
            if let Some(start) = current.take() {
                spans.push((start, i - 1));
            }
            continue;
        }

        current.get_or_insert(i);
    }

    if let Some(start) = current {
        spans.push((start, lines.len() - 1));
    }
    spans
}

impl ChunkStrategy for FallbackStrategy {
    fn apply(&self, ctx: &StrategyContext<'_>) -> AppResult<Vec<Chunk>> {
        let max = ctx.config.max_chunk_size;
        let mut chunks = Vec::new();
        let mut group: Option<(usize, usize)> = None;
        let mut size = 0usize;

        let flush = |group: &mut Option<(usize, usize)>, chunks: &mut Vec<Chunk>| {
            if let Some((start, end)) = group.take() {
                if let Some((content, s, e)) = render_lines(ctx.lines, start, end) {
                    let path = ctx.headers.path_at(s).to_string();
                    chunks.push(Chunk::new(content, s, e, StrategyId::Fallback, path));
                }
            }
        };

        for (start, end) in paragraphs(ctx.lines) {
            let chars = ctx.lines[start..=end]
                .iter()
                .map(|l| l.chars().count())
                .sum::<usize>()
                + (end - start);

            if chars > max {
                flush(&mut group, &mut chunks);
                size = 0;
                let units = build_units(ctx, start, end);
                chunks.extend(pack_units(
                    ctx,
                    &units,
                    StrategyId::Fallback,
                    PackOptions {
                        break_at_headers: false,
                        header_path: None,
                    },
                ));
                continue;
            }

            match group {
                Some((g_start, g_end)) if size + (start - g_end) + chars <= max => {
                    size += (start - g_end) + chars;
                    group = Some((g_start, end));
                }
                _ => {
                    flush(&mut group, &mut chunks);
                    group = Some((start, end));
                    size = chars;
                }
            }
        }
        flush(&mut group, &mut chunks);

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, count_fence_markers};
    use crate::chunk::{HeaderIndex, HeaderTrail, OversizeReason};
    use crate::config::ChunkConfig;

    fn run(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
        let lines: Vec<&str> = text.lines().collect();
        let analysis = analyze(text).unwrap();
        let headers = HeaderIndex::new(&analysis, &HeaderTrail::new());
        let ctx = StrategyContext {
            text,
            lines: &lines,
            analysis: &analysis,
            config,
            headers: &headers,
        };
        FallbackStrategy.apply(&ctx).unwrap()
    }

    #[test]
    fn test_paragraph_spans_respect_fences() {
        let lines = vec!["a", "", "```", "x", "", "y", "```", "", "b"];
        assert_eq!(paragraphs(&lines), vec![(0, 0), (2, 6), (8, 8)]);
    }

    #[test]
    fn test_groups_paragraphs_up_to_max() {
        let para = "Plain prose sentence here.";
        let text = vec![para; 10].join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 90,
            min_chunk_size: 10,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(&text, &config);
        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| c.size() <= 90));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, 19);
    }

    #[test]
    fn test_single_paragraph_without_blank_lines() {
        let text = "one long line of prose that keeps going. ".repeat(30);
        let config = ChunkConfig {
            max_chunk_size: 200,
            min_chunk_size: 20,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(text.trim(), &config);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.size() <= 200));
    }

    #[test]
    fn test_oversized_fence_kept_whole() {
        let code = "print('x')\n\n".repeat(30);
        let text = format!("```python\n{}```", code);
        let config = ChunkConfig {
            max_chunk_size: 100,
            min_chunk_size: 10,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(&text, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(count_fence_markers(&chunks[0].content), 2);
        assert_eq!(
            chunks[0].metadata.oversize_reason,
            Some(OversizeReason::CodeBlockIntegrity)
        );
    }

    #[test]
    fn test_oversized_table_paragraph_kept_whole() {
        let rows: String = (0..30).map(|i| format!("| {} | {} |\n", i, i)).collect();
        let text = format!("| a | b |\n|---|---|\n{}", rows);
        let config = ChunkConfig {
            max_chunk_size: 100,
            min_chunk_size: 10,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(&text, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].metadata.oversize_reason,
            Some(OversizeReason::TableIntegrity)
        );
    }
}
