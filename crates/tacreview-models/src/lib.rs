//! Shared data models for the TacReview analysis pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Validated video metadata and container formats
//! - Sampled frames handed from the sampler to the analysis stage
//! - Per-frame tactical analyses returned by the vision model
//! - Tactical tags and performance categories
//! - The aggregated session report

pub mod analysis;
pub mod frame;
pub mod report;
pub mod tags;
pub mod video;

// Re-export common types
pub use analysis::{CoverStatus, DetectedEntity, EntityKind, FrameAnalysis, Position};
pub use frame::{SampledFrame, FRAME_MIME_TYPE};
pub use report::{
    AnalysisGap, CoverStatistics, Coverage, DecodeGap, GapKind, PerformanceRating,
    RankedFinding, ScoreRange, SessionId, SessionReport,
};
pub use tags::{PerformanceCategory, TacticalTag};
pub use video::{ContainerFormat, Resolution, VideoMetadata};
