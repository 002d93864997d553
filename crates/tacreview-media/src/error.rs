//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during validation and frame sampling.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The input video failed validation. Fatal to the whole run.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sampling position could not be decoded.
    #[error("Frame decode failed at {timestamp:.3}s: {message}")]
    FrameDecode { timestamp: f64, message: String },

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a frame decode error.
    pub fn frame_decode(timestamp: f64, message: impl Into<String>) -> Self {
        Self::FrameDecode {
            timestamp,
            message: message.into(),
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// True if this error invalidates the whole input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, MediaError::InvalidInput(_))
    }

    /// True if this error is local to one sampling position.
    pub fn is_frame_decode(&self) -> bool {
        matches!(self, MediaError::FrameDecode { .. })
    }
}
