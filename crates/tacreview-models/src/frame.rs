//! Sampled frame model.

use std::fmt;

/// MIME type of the encoded frame buffers produced by the sampler.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// A single frame extracted from the input video.
///
/// Owns the encoded image buffer. Frames are created by the sampler with
/// contiguous zero-based sequence indices and are never modified afterwards.
#[derive(Clone, PartialEq)]
pub struct SampledFrame {
    /// Position in sampling order (0-based, contiguous within a run)
    pub sequence_index: u32,
    /// Sampling ratio this frame was requested at (0 < ratio < 1)
    pub ratio: f64,
    /// Timestamp of the decoded frame in seconds
    pub timestamp: f64,
    /// Width of the normalized image
    pub width: u32,
    /// Height of the normalized image
    pub height: u32,
    /// Encoded image bytes
    pub image: Vec<u8>,
    /// MIME type of `image`
    pub mime_type: String,
}

impl SampledFrame {
    /// Create a JPEG frame.
    pub fn jpeg(
        sequence_index: u32,
        ratio: f64,
        timestamp: f64,
        width: u32,
        height: u32,
        image: Vec<u8>,
    ) -> Self {
        Self {
            sequence_index,
            ratio,
            timestamp,
            width,
            height,
            image,
            mime_type: FRAME_MIME_TYPE.to_string(),
        }
    }

    /// File name used when persisting the frame.
    pub fn file_name(&self) -> String {
        format!("frame_{:03}_{:.1}s.jpg", self.sequence_index, self.timestamp)
    }
}

// Keep image bytes out of debug output.
impl fmt::Debug for SampledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampledFrame")
            .field("sequence_index", &self.sequence_index)
            .field("ratio", &self.ratio)
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.image.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}
