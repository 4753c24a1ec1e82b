//! Structural strategy for header-organized documents.

use mdchunk_core::AppResult;

use super::units::{build_units, pack_units, PackOptions};
use super::{ChunkStrategy, StrategyContext, StrategyId};
use crate::chunk::{render_lines, Chunk, OversizeReason, PREAMBLE_PATH};

/// Splits at header boundaries.
///
/// Each section runs from its header to the next header of any level. A
/// section within `max_chunk_size` is one chunk; one within the oversize
/// tolerance stays whole and is flagged; larger sections are packed from
/// their block units under the section's header path.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralStrategy;

impl StructuralStrategy {
    fn section(
        &self,
        ctx: &StrategyContext<'_>,
        start: usize,
        end: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let Some((content, s, e)) = render_lines(ctx.lines, start, end) else {
            return;
        };
        let path = ctx.headers.path_at(s).to_string();
        let size = content.chars().count();

        if size <= ctx.config.max_chunk_size {
            chunks.push(Chunk::new(content, s, e, StrategyId::Structural, path));
        } else if size <= ctx.config.tolerated_size() {
            let mut chunk = Chunk::new(content, s, e, StrategyId::Structural, path);
            chunk.flag_oversize(OversizeReason::SectionIntegrity);
            chunks.push(chunk);
        } else {
            tracing::debug!("Splitting section {} ({} chars) into units", path, size);
            let units = build_units(ctx, start, end);
            chunks.extend(pack_units(
                ctx,
                &units,
                StrategyId::Structural,
                PackOptions {
                    break_at_headers: false,
                    header_path: Some(&path),
                },
            ));
        }
    }
}

impl ChunkStrategy for StructuralStrategy {
    fn apply(&self, ctx: &StrategyContext<'_>) -> AppResult<Vec<Chunk>> {
        let mut chunks = Vec::new();
        if ctx.lines.is_empty() {
            return Ok(chunks);
        }
        let last_line = ctx.lines.len() - 1;

        // 0-based header lines
        let header_lines: Vec<usize> = ctx.analysis.headers().map(|(line, _, _)| line - 1).collect();
        let first_header = header_lines.first().copied().unwrap_or(ctx.lines.len());

        if first_header > 0 {
            // A window that starts inside a section continues it.
            let extract = ctx.config.extract_preamble && ctx.headers.at_document_root();
            match (&ctx.analysis.preamble, extract) {
                (Some(preamble), true) if !header_lines.is_empty() => {
                    if let Some((content, s, e)) = render_lines(ctx.lines, 0, first_header - 1) {
                        let mut chunk = Chunk::new(
                            content,
                            s,
                            e,
                            StrategyId::Structural,
                            PREAMBLE_PATH.to_string(),
                        );
                        chunk.metadata.preamble_type = Some(preamble.preamble_type);
                        if chunk.size() > ctx.config.max_chunk_size {
                            chunk.flag_oversize(OversizeReason::SectionIntegrity);
                        }
                        chunks.push(chunk);
                    }
                }
                _ => self.section(ctx, 0, first_header - 1, &mut chunks),
            }
        }

        for (k, &start) in header_lines.iter().enumerate() {
            let end = header_lines
                .get(k + 1)
                .map_or(last_line, |next| next - 1);
            self.section(ctx, start, end, &mut chunks);
        }

        Ok(chunks)
    }
}
