//! mdchunk CLI
//!
//! Main entry point for the mdchunk command-line tool.
//! Splits Markdown documents into retrieval-sized chunks and prints them as JSON.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AnalyzeCommand, ChunkCommand};
use mdchunk_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// mdchunk - structure-aware Markdown chunking
#[derive(Parser, Debug)]
#[command(name = "mdchunk")]
#[command(about = "Structure-aware Markdown chunking for retrieval pipelines", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "MDCHUNK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a document into chunks
    Chunk(ChunkCommand),

    /// Show the content analysis and the strategy it selects
    Analyze(AnalyzeCommand),
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    )?;

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("mdchunk starting");
    tracing::debug!("Config file: {:?}", config.config_file);

    let command_name = match &cli.command {
        Commands::Chunk(_) => "chunk",
        Commands::Analyze(_) => "analyze",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Chunk(cmd) => cmd.execute(&config),
        Commands::Analyze(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
