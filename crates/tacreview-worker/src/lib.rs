//! Training video review pipeline.
//!
//! This crate provides:
//! - Worker configuration from the environment
//! - Bounded concurrent frame analysis with cancellation
//! - Aggregation of frame analyses into a session report
//! - The end-to-end review session and report export
//! - Structured session logging

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod logging;
pub mod session;

pub use aggregate::{ReportContext, SummaryAggregator};
pub use config::WorkerConfig;
pub use coordinator::{
    CoordinatorConfig, FrameAnalysisCoordinator, FrameAnalyzer, FrameFailure, FrameOutcome,
    FrameResults,
};
pub use error::{AggregateError, WorkerError, WorkerResult};
pub use export::{render_text, ExportPaths, ReportExporter};
pub use logging::SessionLogger;
pub use session::{GeminiReviewSession, ReviewSession, SessionOutput};
