//! Input video validation.
//!
//! Validation is all-or-nothing: every check runs before any frame work
//! starts, and the first failing check rejects the whole file.

use std::path::Path;
use tracing::{debug, info};

use tacreview_models::{ContainerFormat, Resolution, VideoMetadata};

use crate::error::{MediaError, MediaResult};
use crate::probe::MediaProbe;

/// Upper bounds applied to input videos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationLimits {
    /// Maximum duration in seconds
    pub max_duration_secs: f64,
    /// Maximum file size in bytes
    pub max_file_size_bytes: u64,
}

impl ValidationLimits {
    pub fn new(max_duration_secs: f64, max_file_size_mb: u64) -> Self {
        Self {
            max_duration_secs,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
        }
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self::new(120.0, 100)
    }
}

/// Validates input videos and produces their metadata.
#[derive(Debug, Clone)]
pub struct VideoValidator<P> {
    probe: P,
    limits: ValidationLimits,
}

impl<P: MediaProbe> VideoValidator<P> {
    pub fn new(probe: P, limits: ValidationLimits) -> Self {
        Self { probe, limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate a video file.
    ///
    /// Checks existence, container format, file size, probed duration and
    /// the video stream, in that order. Any failure is `InvalidInput`.
    pub async fn validate(&self, path: &Path) -> MediaResult<VideoMetadata> {
        let fs_meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => {
                return Err(MediaError::invalid_input(format!(
                    "Not a regular file: {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(MediaError::invalid_input(format!(
                    "Video file not found or unreadable: {} ({})",
                    path.display(),
                    e
                )))
            }
        };

        let format = ContainerFormat::from_path(path).ok_or_else(|| {
            MediaError::invalid_input(format!(
                "Unsupported video format for {}. Supported formats: {}",
                path.display(),
                ContainerFormat::supported_list()
            ))
        })?;

        let size_bytes = fs_meta.len();
        if size_bytes > self.limits.max_file_size_bytes {
            return Err(MediaError::invalid_input(format!(
                "File too large: {:.1}MB (max {:.0}MB)",
                size_bytes as f64 / (1024.0 * 1024.0),
                self.limits.max_file_size_bytes as f64 / (1024.0 * 1024.0)
            )));
        }

        let info = self.probe.probe(path).await.map_err(|e| match e {
            MediaError::InvalidInput(msg) => MediaError::InvalidInput(msg),
            other => MediaError::invalid_input(format!("Could not read video: {}", other)),
        })?;
        debug!(
            duration = info.duration,
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Probed video"
        );

        if !info.duration.is_finite() || info.duration <= 0.0 {
            return Err(MediaError::invalid_input(format!(
                "Invalid video duration: {}s",
                info.duration
            )));
        }

        if info.duration > self.limits.max_duration_secs {
            return Err(MediaError::invalid_input(format!(
                "Video too long: {:.1}s (max {:.0}s)",
                info.duration, self.limits.max_duration_secs
            )));
        }

        if info.width == 0 || info.height == 0 {
            return Err(MediaError::invalid_input(format!(
                "Video stream has invalid dimensions: {}x{}",
                info.width, info.height
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let metadata = VideoMetadata {
            path: path.to_path_buf(),
            file_name,
            duration_secs: info.duration,
            resolution: Resolution::new(info.width, info.height),
            fps: info.fps,
            size_bytes,
            format,
            codec: info.codec,
        };

        info!(
            file = %metadata.file_name,
            duration_secs = metadata.duration_secs,
            resolution = %metadata.resolution,
            size_mb = format!("{:.1}", metadata.size_mb()),
            "Video validated"
        );

        Ok(metadata)
    }
}
