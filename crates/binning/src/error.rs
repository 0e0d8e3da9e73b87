//! Error types for binning.

use thiserror::Error;

/// Errors that can occur while configuring or running a binning job.
///
/// Missing or NaN observation values are not errors; aggregators absorb
/// them as "no contribution".
#[derive(Error, Debug)]
pub enum BinningError {
    /// Invalid run or grid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No aggregator is registered under the given type name.
    #[error("unknown aggregator type: {0}")]
    UnknownAggregator(String),

    /// An aggregator or post-processor refers to a variable that does not exist.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// A named parameter has a malformed value.
    #[error("invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// Temporal bins must carry a non-negative index.
    #[error("invalid bin index {0}: must be non-negative")]
    InvalidBinIndex(i64),

    /// A bin's feature array does not match the declared feature count.
    #[error("feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// A bin record ended before all declared fields were read.
    #[error("truncated bin record: {0}")]
    Truncated(String),

    /// A bin record contains values that cannot be decoded.
    #[error("corrupt bin record: {0}")]
    Corrupt(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BinningError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a Truncated error.
    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::Truncated(msg.into())
    }

    /// Create a Corrupt error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Whether this error was raised while building the run configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownAggregator(_)
                | Self::UnknownVariable(_)
                | Self::InvalidParameter { .. }
        )
    }
}

impl From<std::io::Error> for BinningError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated(err.to_string())
        } else {
            Self::Storage(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BinningError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for BinningError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for binning operations.
pub type Result<T> = std::result::Result<T, BinningError>;
