//! Code-aware strategy for documents dominated by code blocks and tables.

use mdchunk_core::AppResult;

use super::units::{build_units, pack_units, PackOptions};
use super::{ChunkStrategy, StrategyContext, StrategyId};
use crate::chunk::Chunk;

/// Packs block units greedily, keeping every fenced block and table whole.
///
/// Prose between atomic blocks is packed up to `max_chunk_size`; a new chunk
/// starts at a header once the current one has reached `min_chunk_size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeAwareStrategy;

impl ChunkStrategy for CodeAwareStrategy {
    fn apply(&self, ctx: &StrategyContext<'_>) -> AppResult<Vec<Chunk>> {
        if ctx.lines.is_empty() {
            return Ok(Vec::new());
        }

        let units = build_units(ctx, 0, ctx.lines.len() - 1);
        Ok(pack_units(
            ctx,
            &units,
            StrategyId::CodeAware,
            PackOptions {
                break_at_headers: true,
                header_path: None,
            },
        ))
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
        CodeAwareStrategy.apply(&ctx).unwrap()
    }

    #[test]
    fn test_code_blocks_never_split() {
        let mut doc = String::from("# API\n\n");
        for i in 0..6 {
            doc.push_str(&format!(
                "Call number {} does the following.\n\n```python\ndef f{}():\n    return {}\n```\n\n",
                i, i, i
            ));
        }
        let config = ChunkConfig {
            max_chunk_size: 150,
            min_chunk_size: 30,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(&doc, &config);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(count_fence_markers(&chunk.content) % 2, 0);
            assert_eq!(chunk.metadata.strategy, StrategyId::CodeAware);
        }
    }

    #[test]
    fn test_large_table_flagged() {
        let rows: String = (0..40).map(|i| format!("| {} | {} |\n", i, i * i)).collect();
        let doc = format!("Numbers:\n\n| n | square |\n|---|---|\n{}", rows);
        let config = ChunkConfig {
            max_chunk_size: 200,
            min_chunk_size: 20,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(&doc, &config);
        let table = chunks.iter().find(|c| c.content.contains("| n |")).unwrap();
        assert!(table.content.contains("| 39 |"));
        assert_eq!(table.metadata.oversize_reason, Some(OversizeReason::TableIntegrity));
    }

    #[test]
    fn test_breaks_at_headers_past_min_size() {
        let text = "## One\n\nalpha beta gamma delta epsilon\n\n## Two\n\nzeta eta theta iota kappa";
        let config = ChunkConfig {
            max_chunk_size: 1000,
            min_chunk_size: 10,
            overlap_size: 0,
            ..Default::default()
        };

        let chunks = run(text, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.header_path, "/One");
        assert_eq!(chunks[1].metadata.header_path, "/Two");
        assert_eq!(chunks[1].start_line, 5);
    }
}
