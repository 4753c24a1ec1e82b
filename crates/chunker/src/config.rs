//! Chunking configuration.
//!
//! `ChunkConfig` and `StreamingConfig` are explicit, validated structs. Older
//! option names are accepted only through `RawChunkConfig`, which maps them
//! onto the current fields once, at construction time:
//!
//! | legacy name | current field |
//! |---|---|
//! | `max_size` | `max_chunk_size` |
//! | `min_size` | `min_chunk_size` |
//! | `overlap`, `overlap_chars` | `overlap_size` |
//! | `enable_overlap: false` | `overlap_size = 0` |
//! | `preserve_code_blocks`, `preserve_tables` | `preserve_atomic_blocks` |
//! | `header_threshold`, `min_headers` | `structure_threshold` |
//! | `code_ratio_threshold` | `code_threshold` |
//! | `strategy` | `strategy_override` (`"auto"` means none) |
//! | `allow_oversize_ratio` | `oversize_tolerance` |

use mdchunk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::chunk::StrategyId;

/// Batch input ceiling.
pub const MAX_INPUT_BYTES: usize = 100 * 1024 * 1024;

/// Configuration for the chunking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub max_chunk_size: usize,

    /// Chunks below this size are merge candidates
    pub min_chunk_size: usize,

    /// Overlap context length in characters (0 disables overlap)
    pub overlap_size: usize,

    /// Never split fenced code blocks or tables
    pub preserve_atomic_blocks: bool,

    /// Emit the text before the first header as its own chunk
    pub extract_preamble: bool,

    /// Code ratio at which the code-aware strategy is selected
    pub code_threshold: f64,

    /// Header count at which the structural strategy is selected
    pub structure_threshold: usize,

    /// Skip selection and always use this strategy
    pub strategy_override: Option<StrategyId>,

    /// Fraction above `max_chunk_size` a section may reach to stay whole
    pub oversize_tolerance: f64,

    /// Analysis tunables
    pub analysis: AnalysisConfig,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            min_chunk_size: 512,
            overlap_size: 200,
            preserve_atomic_blocks: true,
            extract_preamble: true,
            code_threshold: 0.3,
            structure_threshold: 3,
            strategy_override: None,
            oversize_tolerance: 0.2,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ChunkConfig {
    /// Larger chunks and an eager code-aware strategy for API docs and tutorials.
    pub fn for_code_docs() -> Self {
        Self {
            max_chunk_size: 8192,
            min_chunk_size: 1024,
            code_threshold: 0.2,
            ..Default::default()
        }
    }

    /// Section-oriented chunking for long structured documents.
    pub fn for_structured_docs() -> Self {
        Self {
            max_chunk_size: 6144,
            min_chunk_size: 256,
            structure_threshold: 2,
            code_threshold: 0.5,
            ..Default::default()
        }
    }

    /// Small chunks for fine-grained retrieval.
    pub fn for_small_chunks() -> Self {
        Self {
            max_chunk_size: 1024,
            min_chunk_size: 128,
            overlap_size: 100,
            ..Default::default()
        }
    }

    /// Size above which a chunk must carry an explicit oversize flag to be kept whole.
    pub fn tolerated_size(&self) -> usize {
        (self.max_chunk_size as f64 * (1.0 + self.oversize_tolerance)).floor() as usize
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_chunk_size == 0 {
            return Err(AppError::Configuration(
                "max_chunk_size must be > 0".to_string(),
            ));
        }

        if self.min_chunk_size >= self.max_chunk_size {
            return Err(AppError::Configuration(format!(
                "min_chunk_size ({}) must be less than max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }

        if self.overlap_size >= self.max_chunk_size {
            return Err(AppError::Configuration(format!(
                "overlap_size ({}) must be less than max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }

        if !(0.0..=1.0).contains(&self.code_threshold) {
            return Err(AppError::Configuration(format!(
                "code_threshold ({}) must be within [0, 1]",
                self.code_threshold
            )));
        }

        if self.structure_threshold < 1 {
            return Err(AppError::Configuration(
                "structure_threshold must be >= 1".to_string(),
            ));
        }

        if !self.oversize_tolerance.is_finite() || self.oversize_tolerance < 0.0 {
            return Err(AppError::Configuration(format!(
                "oversize_tolerance ({}) must be a non-negative number",
                self.oversize_tolerance
            )));
        }

        self.analysis.validate()
    }
}

/// Analysis tunables: complexity weighting and classification thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub weights: ComplexityWeights,
    pub thresholds: ClassificationThresholds,
}

impl AnalysisConfig {
    fn validate(&self) -> AppResult<()> {
        let w = &self.weights;
        for (name, value) in [
            ("header_depth", w.header_depth),
            ("list_depth", w.list_depth),
            ("ratio_variance", w.ratio_variance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Configuration(format!(
                    "complexity weight '{}' must be a non-negative number",
                    name
                )));
            }
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("code_heavy", t.code_heavy),
            ("list_heavy", t.list_heavy),
            ("minimal_code", t.minimal_code),
            ("mixed_component", t.mixed_component),
            ("mixed_text", t.mixed_text),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Configuration(format!(
                    "classification threshold '{}' must be within [0, 1]",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Relative weights of the complexity score components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplexityWeights {
    pub header_depth: f64,
    pub list_depth: f64,
    pub ratio_variance: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            header_depth: 0.4,
            list_depth: 0.3,
            ratio_variance: 0.3,
        }
    }
}

/// Ratio thresholds used to classify content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationThresholds {
    /// Code ratio at or above which content is `code_heavy`
    pub code_heavy: f64,

    /// List ratio at or above which content is `list_heavy`
    pub list_heavy: f64,

    /// Code ratio below which code counts as minimal
    pub minimal_code: f64,

    /// Code/list/table ratio above which the component signals `mixed`
    pub mixed_component: f64,

    /// Text ratio above which text signals `mixed`
    pub mixed_text: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            code_heavy: 0.7,
            list_heavy: 0.6,
            minimal_code: 0.1,
            mixed_component: 0.1,
            mixed_text: 0.2,
        }
    }
}

/// Configuration for the streaming engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Target window size in characters
    pub buffer_size: usize,

    /// Lines of trailing context carried across a window boundary
    pub overlap_lines: usize,

    /// Ceiling for a single window, in megabytes
    pub max_memory_mb: usize,

    /// Hard-cut position as a fraction of `buffer_size`
    pub safe_split_threshold: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100_000,
            overlap_lines: 20,
            max_memory_mb: 100,
            safe_split_threshold: 0.8,
        }
    }
}

impl StreamingConfig {
    /// Window ceiling in bytes.
    pub fn max_window_bytes(&self) -> usize {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.buffer_size == 0 {
            return Err(AppError::Configuration(
                "buffer_size must be > 0".to_string(),
            ));
        }

        if !(self.safe_split_threshold > 0.0 && self.safe_split_threshold <= 1.0) {
            return Err(AppError::Configuration(format!(
                "safe_split_threshold ({}) must be within (0, 1]",
                self.safe_split_threshold
            )));
        }

        if self.max_window_bytes() < self.buffer_size {
            return Err(AppError::Configuration(format!(
                "max_memory_mb ({}) is too small for buffer_size ({})",
                self.max_memory_mb, self.buffer_size
            )));
        }

        Ok(())
    }
}

/// Chunking options as written by users, current and legacy names alike.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawChunkConfig {
    #[serde(alias = "max_size")]
    pub max_chunk_size: Option<usize>,

    #[serde(alias = "min_size")]
    pub min_chunk_size: Option<usize>,

    #[serde(alias = "overlap", alias = "overlap_chars")]
    pub overlap_size: Option<usize>,

    pub enable_overlap: Option<bool>,

    pub preserve_atomic_blocks: Option<bool>,
    pub preserve_code_blocks: Option<bool>,
    pub preserve_tables: Option<bool>,

    pub extract_preamble: Option<bool>,

    #[serde(alias = "code_ratio_threshold")]
    pub code_threshold: Option<f64>,

    #[serde(alias = "header_threshold", alias = "min_headers")]
    pub structure_threshold: Option<usize>,

    #[serde(alias = "strategy")]
    pub strategy_override: Option<String>,

    #[serde(alias = "allow_oversize_ratio")]
    pub oversize_tolerance: Option<f64>,

    pub analysis: Option<AnalysisConfig>,
}

impl TryFrom<RawChunkConfig> for ChunkConfig {
    type Error = AppError;

    fn try_from(raw: RawChunkConfig) -> AppResult<Self> {
        let defaults = ChunkConfig::default();

        let strategy_override = match raw.strategy_override.as_deref() {
            None | Some("auto") | Some("") => None,
            Some(name) => Some(name.parse::<StrategyId>()?),
        };

        let overlap_size = match raw.enable_overlap {
            Some(false) => 0,
            _ => raw.overlap_size.unwrap_or(defaults.overlap_size),
        };

        let preserve_atomic_blocks = raw.preserve_atomic_blocks.unwrap_or_else(|| {
            raw.preserve_code_blocks != Some(false) && raw.preserve_tables != Some(false)
        });

        let config = ChunkConfig {
            max_chunk_size: raw.max_chunk_size.unwrap_or(defaults.max_chunk_size),
            min_chunk_size: raw.min_chunk_size.unwrap_or(defaults.min_chunk_size),
            overlap_size,
            preserve_atomic_blocks,
            extract_preamble: raw.extract_preamble.unwrap_or(defaults.extract_preamble),
            code_threshold: raw.code_threshold.unwrap_or(defaults.code_threshold),
            structure_threshold: raw
                .structure_threshold
                .unwrap_or(defaults.structure_threshold),
            strategy_override,
            oversize_tolerance: raw
                .oversize_tolerance
                .unwrap_or(defaults.oversize_tolerance),
            analysis: raw.analysis.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration file layout. Sections other than these are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    chunking: Option<RawChunkConfig>,

    #[serde(default)]
    streaming: Option<StreamingConfig>,
}

/// Validated configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedConfig {
    pub chunking: ChunkConfig,
    pub streaming: StreamingConfig,
}

/// Parse chunking configuration from YAML text.
pub fn parse_config(yaml: &str) -> AppResult<LoadedConfig> {
    let file: ConfigFile = serde_yaml::from_str(yaml)
        .map_err(|e| AppError::Configuration(format!("Failed to parse config: {}", e)))?;

    let chunking = match file.chunking {
        Some(raw) => ChunkConfig::try_from(raw)?,
        None => ChunkConfig::default(),
    };

    let streaming = file.streaming.unwrap_or_default();
    streaming.validate()?;

    Ok(LoadedConfig {
        chunking,
        streaming,
    })
}

/// Load chunking configuration from a YAML file.
pub fn load_config(path: &Path) -> AppResult<LoadedConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Configuration(format!("Failed to read config at {:?}: {}", path, e))
    })?;

    let loaded = parse_config(&content)?;
    tracing::debug!("Loaded chunking config from {:?}", path);
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChunkConfig::default();
        assert_eq!(config.max_chunk_size, 4096);
        assert_eq!(config.min_chunk_size, 512);
        assert_eq!(config.overlap_size, 200);
        assert_eq!(config.structure_threshold, 3);
        assert!(config.validate().is_ok());
        assert!(StreamingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ChunkConfig::for_code_docs().validate().is_ok());
        assert!(ChunkConfig::for_structured_docs().validate().is_ok());
        assert!(ChunkConfig::for_small_chunks().validate().is_ok());
    }

    #[test]
    fn test_min_must_be_below_max() {
        let config = ChunkConfig {
            min_chunk_size: 4096,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_overlap_must_be_below_max() {
        let config = ChunkConfig {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_code_threshold_range() {
        let config = ChunkConfig {
            code_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_structure_threshold_minimum() {
        let config = ChunkConfig {
            structure_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_streaming_threshold_range() {
        let config = StreamingConfig {
            safe_split_threshold: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StreamingConfig {
            safe_split_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tolerated_size() {
        let config = ChunkConfig::default();
        assert_eq!(config.tolerated_size(), 4915);
    }

    #[test]
    fn test_legacy_names_are_mapped() {
        let yaml = r#"
chunking:
  max_size: 2000
  min_size: 200
  overlap: 50
  header_threshold: 2
  preserve_tables: false
  strategy: structural
"#;
        let loaded = parse_config(yaml).unwrap();
        let config = loaded.chunking;
        assert_eq!(config.max_chunk_size, 2000);
        assert_eq!(config.min_chunk_size, 200);
        assert_eq!(config.overlap_size, 50);
        assert_eq!(config.structure_threshold, 2);
        assert!(!config.preserve_atomic_blocks);
        assert_eq!(config.strategy_override, Some(StrategyId::Structural));
    }

    #[test]
    fn test_enable_overlap_false_disables_overlap() {
        let raw = RawChunkConfig {
            overlap_size: Some(100),
            enable_overlap: Some(false),
            ..Default::default()
        };
        let config = ChunkConfig::try_from(raw).unwrap();
        assert_eq!(config.overlap_size, 0);
    }

    #[test]
    fn test_auto_strategy_means_no_override() {
        let raw = RawChunkConfig {
            strategy_override: Some("auto".to_string()),
            ..Default::default()
        };
        assert_eq!(ChunkConfig::try_from(raw).unwrap().strategy_override, None);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let raw = RawChunkConfig {
            strategy_override: Some("semantic".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ChunkConfig::try_from(raw),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_chunking_key_rejected() {
        let yaml = "chunking:\n  max_chunk_size: 2000\n  bogus: 1\n";
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_invalid_values_rejected_at_load() {
        let yaml = "chunking:\n  max_chunk_size: 100\n  min_chunk_size: 200\n";
        assert!(matches!(
            parse_config(yaml),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "logging:\n  level: debug\nchunking:\n  max_chunk_size: 3000\nstreaming:\n  buffer_size: 5000\n  overlap_lines: 5"
        )
        .unwrap();

        let loaded = load_config(file.path()).unwrap();
        assert_eq!(loaded.chunking.max_chunk_size, 3000);
        assert_eq!(loaded.streaming.buffer_size, 5000);
        assert_eq!(loaded.streaming.overlap_lines, 5);
        assert_eq!(loaded.streaming.max_memory_mb, 100);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/mdchunk.yaml"));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
