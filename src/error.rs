use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while loading tables or computing composite indicators.
///
/// None of these are recovered from inside the engine: a composite built
/// from partial inputs would rank regions on wrong numbers, so every
/// condition surfaces to the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("reference region '{region}' is missing from metric '{metric}'")]
    MissingReferenceRegion { metric: String, region: String },

    #[error("reference region '{region}' has a zero value for metric '{metric}'")]
    ZeroReference { metric: String, region: String },

    #[error("metric '{metric}' has a degenerate range: every value equals {value}")]
    DegenerateRange { metric: String, value: f64 },

    #[error("input '{input}' has no value for region '{region}'")]
    IncompleteInput { input: String, region: String },

    #[error("invalid weights for '{composite}': {reason}")]
    InvalidWeights { composite: String, reason: String },

    #[error("malformed source {path}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EngineError::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn incomplete(input: impl Into<String>, region: impl Into<String>) -> Self {
        EngineError::IncompleteInput {
            input: input.into(),
            region: region.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
