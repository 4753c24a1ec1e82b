//! Analyze command handler.

use anyhow::Context;
use clap::Args;
use mdchunk_core::config::AppConfig;
use mdchunk_engine::{analyze_with, select_strategy, ContentAnalysis, StrategyId};
use serde::Serialize;
use std::path::PathBuf;

use super::input::{loaded_config, read_bytes};

/// Show the content analysis of a document
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// Input file, or `-` for stdin
    pub path: PathBuf,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    strategy: StrategyId,
    analysis: ContentAnalysis,
}

impl AnalyzeCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing analyze command for {}", self.path.display());

        let chunking = loaded_config(config)?.chunking;
        let bytes = read_bytes(&self.path)?;
        let text = std::str::from_utf8(&bytes)
            .with_context(|| format!("{} is not valid UTF-8", self.path.display()))?;

        let analysis = analyze_with(text, &chunking.analysis)?;
        let strategy = select_strategy(&analysis, &chunking);
        tracing::debug!("Selected strategy: {}", strategy);

        let output = AnalyzeOutput { strategy, analysis };
        let json = if self.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        println!("{}", json);
        Ok(())
    }
}
