use thiserror::Error;

/// Errors surfaced by the indicator engine and the console front end.
///
/// Data-quality conditions (missing values, zero denominators, empty groups)
/// never show up here; they are reflected in result shapes instead.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The API was called with a key, tag or value it does not understand.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was rejected.
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ReportError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
