//! FFmpeg CLI wrapper for input validation and frame sampling.
//!
//! This crate provides:
//! - Video validation against format, size and duration limits
//! - FFprobe-backed metadata probing
//! - Single-frame decoding with tolerance probing around each position
//! - Aspect-preserving downscaling and JPEG encoding of sampled frames

pub mod command;
pub mod decode;
pub mod error;
pub mod probe;
pub mod resize;
pub mod sampler;
pub mod validate;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegRunner, FrameGrabCommand};
pub use decode::{FfmpegFrameDecoder, FrameDecoder};
pub use error::{MediaError, MediaResult};
pub use probe::{FfprobeProbe, MediaProbe, ProbeInfo};
pub use resize::{fit_within, normalize, EncodedFrame};
pub use sampler::{
    frame_timestamp, DecodeFailure, FrameSampler, SampleOutcome, SamplerConfig, DEFAULT_POSITIONS,
};
pub use validate::{ValidationLimits, VideoValidator};
