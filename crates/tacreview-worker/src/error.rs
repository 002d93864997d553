//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that end a review run.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] tacreview_media::MediaError),

    #[error("Vision error: {0}")]
    Vision(#[from] tacreview_vision::VisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Lift a media error, keeping input rejections distinguishable.
    pub fn from_media(err: tacreview_media::MediaError) -> Self {
        match err {
            tacreview_media::MediaError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Media(other),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, WorkerError::InvalidInput(_))
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, WorkerError::InsufficientData(_))
    }
}

/// Aggregation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No frame analysis succeeded ({failed} of {total} frames failed)")]
    InsufficientData { total: usize, failed: usize },
}

impl From<AggregateError> for WorkerError {
    fn from(err: AggregateError) -> Self {
        WorkerError::InsufficientData(err.to_string())
    }
}
