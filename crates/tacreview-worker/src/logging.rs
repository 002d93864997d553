//! Structured session logging utilities.

use std::time::Duration;
use tracing::{error, info, warn, Span};

use tacreview_models::SessionId;

/// Session logger stamping every lifecycle event with the session ID and
/// the operation being performed.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    operation: String,
}

impl SessionLogger {
    pub fn new(session_id: &SessionId, operation: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session completed: {}", message
        );
    }

    /// Log the end of a pipeline stage with its wall time.
    pub fn log_stage(&self, stage: &str, elapsed: Duration, detail: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage {} finished: {}", stage, detail
        );
    }

    /// Log a frame whose analysis is missing from the report.
    pub fn log_frame_gap(&self, sequence_index: u32, timestamp: f64, attempts: u32, reason: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            sequence_index,
            timestamp,
            attempts,
            "Frame {} at {:.1}s has no analysis: {}", sequence_index, timestamp, reason
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this session.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_logger_creation() {
        let session_id = SessionId::new();
        let logger = SessionLogger::new(&session_id, "review");

        assert_eq!(logger.session_id(), session_id.as_str());
        assert_eq!(logger.operation(), "review");
    }
}
