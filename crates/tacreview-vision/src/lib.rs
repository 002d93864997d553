//! Vision-model analysis of sampled frames.
//!
//! This crate provides:
//! - A transport seam over the Gemini `generateContent` API
//! - Retry with exponential backoff as a transport decorator
//! - Prompt templates with named slots
//! - Strict parsing of model output into `FrameAnalysis`

pub mod client;
pub mod error;
pub mod metrics;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod transport;
mod types;

pub use client::{AnalysisClient, GeminiAnalysisClient};
pub use error::{AnalysisUnavailable, VisionError, VisionResult};
pub use parse::parse_frame_analysis;
pub use prompt::{PromptTemplate, ANALYSIS_SLOTS, DEFAULT_CONTEXT};
pub use retry::{with_retry, RetryConfig, RetryingTransport};
pub use transport::{
    GeminiConfig, GeminiTransport, InlineImage, VisionRequest, VisionTransport, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
