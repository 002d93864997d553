//! Single-frame decoding.

use async_trait::async_trait;
use image::DynamicImage;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::command::{FfmpegRunner, FrameGrabCommand};
use crate::error::{MediaError, MediaResult};

/// Decodes the frame at a timestamp.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Decode the first frame at or after `timestamp` seconds.
    ///
    /// Failures are reported as `MediaError::FrameDecode`.
    async fn decode_at(&self, video: &Path, timestamp: f64) -> MediaResult<DynamicImage>;
}

/// Decoder that extracts frames with the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegFrameDecoder {
    runner: FfmpegRunner,
}

impl FfmpegFrameDecoder {
    /// Per-frame ffmpeg timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(Self::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn decode_at(&self, video: &Path, timestamp: f64) -> MediaResult<DynamicImage> {
        let output = tempfile::Builder::new()
            .prefix("tacreview-frame-")
            .suffix(".png")
            .tempfile()?
            .into_temp_path();

        let cmd = FrameGrabCommand::new(video, &output).at(timestamp);

        self.runner.run(&cmd).await.map_err(|e| {
            let detail = match &e {
                MediaError::FfmpegFailed {
                    stderr: Some(stderr),
                    ..
                } => format!("{}: {}", e, stderr),
                _ => e.to_string(),
            };
            MediaError::frame_decode(timestamp, detail)
        })?;

        // ffmpeg exits cleanly without writing a frame when seeking past the last one
        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(MediaError::frame_decode(timestamp, "no frame at timestamp"));
        }

        let image = image::load_from_memory(&bytes)
            .map_err(|e| MediaError::frame_decode(timestamp, e.to_string()))?;
        debug!(
            timestamp,
            width = image.width(),
            height = image.height(),
            "Decoded frame"
        );

        Ok(image)
    }
}
