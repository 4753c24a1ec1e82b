//! Input sources and config resolution shared by the commands.

use anyhow::Context;
use mdchunk_core::config::AppConfig;
use mdchunk_engine::{load_config, LoadedConfig};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// `-` reads from stdin.
fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read the whole input as raw bytes.
pub fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    if is_stdin(path) {
        let mut buf = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Open the input as a line reader for streaming.
pub fn open_reader(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    if is_stdin(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Chunking settings from the config file, or defaults without one.
pub fn loaded_config(config: &AppConfig) -> anyhow::Result<LoadedConfig> {
    match &config.config_file {
        Some(path) => load_config(path)
            .with_context(|| format!("Invalid chunking config in {}", path.display())),
        None => Ok(LoadedConfig::default()),
    }
}
