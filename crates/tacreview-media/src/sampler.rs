//! Frame sampling at ratio positions of a validated video.
//!
//! Each position is decoded independently. A position that cannot be
//! decoded, even after probing neighbouring frames inside the tolerance
//! window, is reported as a failure without affecting the others.

use futures::future::join_all;
use tracing::{debug, info, warn};

use tacreview_models::{SampledFrame, VideoMetadata};

use crate::decode::FrameDecoder;
use crate::error::{MediaError, MediaResult};
use crate::resize::{self, EncodedFrame};

/// Default sampling positions.
pub const DEFAULT_POSITIONS: [f64; 3] = [0.25, 0.5, 0.75];

/// Slack for float error when snapping to frame boundaries.
const SNAP_EPSILON: f64 = 1e-6;

/// Sampler settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Longer side of normalized frames, in pixels
    pub resize_max: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// How far from the target timestamp neighbouring frames are probed
    pub tolerance_secs: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            resize_max: 720,
            jpeg_quality: 85,
            tolerance_secs: 0.5,
        }
    }
}

/// A sampling position that could not be decoded.
#[derive(Debug)]
pub struct DecodeFailure {
    pub ratio: f64,
    /// Target timestamp of the position
    pub timestamp: f64,
    pub error: MediaError,
}

/// Result of sampling a video.
#[derive(Debug, Default)]
pub struct SampleOutcome {
    /// Decoded frames in ascending ratio order, indexed contiguously from 0
    pub frames: Vec<SampledFrame>,
    /// Positions that failed, in ascending ratio order
    pub failures: Vec<DecodeFailure>,
}

impl SampleOutcome {
    pub fn positions_requested(&self) -> usize {
        self.frames.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Check sampling positions and return them in ascending order.
///
/// Every ratio must lie strictly between 0 and 1, and no ratio may repeat.
pub fn validate_positions(positions: &[f64]) -> MediaResult<Vec<f64>> {
    if positions.is_empty() {
        return Err(MediaError::invalid_input("No sampling positions given"));
    }

    if let Some(bad) = positions.iter().find(|r| !(**r > 0.0 && **r < 1.0)) {
        return Err(MediaError::invalid_input(format!(
            "Sampling position {} is outside (0, 1)",
            bad
        )));
    }

    let mut sorted = positions.to_vec();
    sorted.sort_by(f64::total_cmp);
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(MediaError::invalid_input(format!(
            "Duplicate sampling position {}",
            pair[0]
        )));
    }

    Ok(sorted)
}

/// Timestamp of the first frame at or after `ratio * duration`,
/// clamped to the start of the last frame.
pub fn frame_timestamp(ratio: f64, duration: f64, fps: f64) -> f64 {
    let fps = fps.max(1.0);
    let snapped = ((ratio * duration * fps) - SNAP_EPSILON).ceil().max(0.0) / fps;
    let last_frame = (duration - 1.0 / fps).max(0.0);
    snapped.min(last_frame)
}

/// Timestamps to try for one position: the target first, then
/// neighbouring frames at +1, -1, +2, -2 intervals within `tolerance`.
pub fn candidate_timestamps(target: f64, duration: f64, fps: f64, tolerance: f64) -> Vec<f64> {
    let interval = 1.0 / fps.max(1.0);
    let mut candidates = vec![target];

    let mut step = 1u32;
    loop {
        let offset = interval * step as f64;
        if offset > tolerance + SNAP_EPSILON {
            break;
        }
        let later = target + offset;
        if later < duration {
            candidates.push(later);
        }
        let earlier = target - offset;
        if earlier >= 0.0 {
            candidates.push(earlier);
        }
        step += 1;
    }

    candidates
}

/// Samples normalized frames from a validated video.
#[derive(Debug, Clone)]
pub struct FrameSampler<D> {
    decoder: D,
    config: SamplerConfig,
}

impl<D: FrameDecoder> FrameSampler<D> {
    pub fn new(decoder: D, config: SamplerConfig) -> Self {
        Self { decoder, config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample one frame per position.
    ///
    /// Fails only when the positions themselves are invalid. Undecodable
    /// positions are returned in `SampleOutcome::failures`.
    pub async fn sample(
        &self,
        metadata: &VideoMetadata,
        positions: &[f64],
    ) -> MediaResult<SampleOutcome> {
        let ratios = validate_positions(positions)?;

        let results = join_all(
            ratios
                .iter()
                .map(|&ratio| self.sample_position(metadata, ratio)),
        )
        .await;

        let mut outcome = SampleOutcome::default();
        for (ratio, result) in ratios.into_iter().zip(results) {
            match result {
                Ok((timestamp, encoded)) => {
                    let index = outcome.frames.len() as u32;
                    outcome.frames.push(SampledFrame::jpeg(
                        index,
                        ratio,
                        timestamp,
                        encoded.width,
                        encoded.height,
                        encoded.bytes,
                    ));
                }
                Err(failure) => {
                    warn!(
                        ratio,
                        timestamp = failure.timestamp,
                        error = %failure.error,
                        "Dropping undecodable sampling position"
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        info!(
            file = %metadata.file_name,
            sampled = outcome.frames.len(),
            failed = outcome.failures.len(),
            "Frame sampling complete"
        );

        Ok(outcome)
    }

    async fn sample_position(
        &self,
        metadata: &VideoMetadata,
        ratio: f64,
    ) -> Result<(f64, EncodedFrame), DecodeFailure> {
        let target = frame_timestamp(ratio, metadata.duration_secs, metadata.fps);
        let candidates = candidate_timestamps(
            target,
            metadata.duration_secs,
            metadata.fps,
            self.config.tolerance_secs,
        );
        let attempts = candidates.len();

        let mut last_error = None;
        for timestamp in candidates {
            match self.decoder.decode_at(&metadata.path, timestamp).await {
                Ok(image) => {
                    let encoded =
                        resize::normalize(&image, self.config.resize_max, self.config.jpeg_quality)
                            .map_err(|error| DecodeFailure {
                                ratio,
                                timestamp: target,
                                error: MediaError::frame_decode(timestamp, error.to_string()),
                            })?;
                    if timestamp != target {
                        debug!(ratio, target, timestamp, "Decoded neighbouring frame");
                    }
                    return Ok((timestamp, encoded));
                }
                Err(error) => {
                    debug!(ratio, timestamp, error = %error, "Frame decode attempt failed");
                    last_error = Some(error);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no decode attempted".to_string());
        Err(DecodeFailure {
            ratio,
            timestamp: target,
            error: MediaError::frame_decode(
                target,
                format!("no decodable frame after {} attempts: {}", attempts, reason),
            ),
        })
    }
}
