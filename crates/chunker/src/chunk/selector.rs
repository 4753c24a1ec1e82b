//! Strategy selection from document analysis.

use super::StrategyId;
use crate::analysis::ContentAnalysis;
use crate::config::ChunkConfig;

/// Pick the strategy for a document.
///
/// An explicit override always wins. Otherwise code-aware handles documents
/// with enough code or any atomic block, structural handles documents with
/// enough headers, and everything else goes to the paragraph fallback.
pub fn select_strategy(analysis: &ContentAnalysis, config: &ChunkConfig) -> StrategyId {
    if let Some(strategy) = config.strategy_override {
        tracing::debug!("Using strategy override: {}", strategy);
        return strategy;
    }

    let strategy = if analysis.code_ratio >= config.code_threshold
        || analysis.code_block_count > 0
        || analysis.table_count > 0
    {
        StrategyId::CodeAware
    } else if analysis.header_count >= config.structure_threshold {
        StrategyId::Structural
    } else {
        StrategyId::Fallback
    };

    tracing::debug!(
        "Selected strategy {} (code_ratio={:.2}, code_blocks={}, tables={}, headers={})",
        strategy,
        analysis.code_ratio,
        analysis.code_block_count,
        analysis.table_count,
        analysis.header_count
    );

    strategy
}
