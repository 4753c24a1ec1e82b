//! Error types for mdchunk.
//!
//! One enum covers every failure category of the chunking engine and its
//! command-line front end. Parsing irregularities (unclosed fences, ragged
//! tables) are never errors; they degrade to best-effort extraction.

use thiserror::Error;

/// Unified error type for mdchunk.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Input that cannot be chunked at all: not text, not UTF-8, too large.
    #[error("Input validation error: {0}")]
    InputValidation(String),

    /// Invalid configuration values or an unreadable config file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A chunking strategy failed while building chunks.
    ///
    /// The batch pipeline recovers from this by re-running the fallback
    /// strategy, so callers normally only see it as a warning.
    #[error("Strategy '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    /// Post-hoc invariant violation over a finished chunk list.
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors from stream sources
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a strategy error for the named strategy.
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Whether the error must abort the current invocation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Strategy { .. } | Self::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_error_display() {
        let err = AppError::strategy("structural", "no sections produced");
        assert_eq!(
            err.to_string(),
            "Strategy 'structural' failed: no sections produced"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_input_validation_is_fatal() {
        let err = AppError::InputValidation("input exceeds 100 MB".into());
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Input validation error"));
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
