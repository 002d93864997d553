//! Error types for vision analysis.

use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors from the vision model transport, response parsing and prompts.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited by vision API")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Vision API server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response schema violation: {0}")]
    SchemaViolation(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<VisionError>,
    },

    #[error("Prompt template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VisionError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited { retry_after_ms },
            401 | 403 => Self::Auth { status, message },
            500..=599 => Self::ServerError { status, message },
            _ => Self::BadRequest { status, message },
        }
    }

    /// Check if the failed call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VisionError::Network(_) | VisionError::RateLimited { .. } | VisionError::ServerError { .. }
        )
    }

    /// Delay requested by the server, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            VisionError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }

    /// Number of attempts recorded by the error. Only exhausted retries
    /// record more than one.
    pub fn attempts(&self) -> u32 {
        match self {
            VisionError::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// True if the response arrived but could not be used.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            VisionError::InvalidResponse(_) | VisionError::SchemaViolation(_)
        )
    }
}

/// A frame whose analysis could not be obtained.
#[derive(Debug, Error)]
#[error("Analysis unavailable for frame {sequence_index} after {attempts} attempt(s): {reason}")]
pub struct AnalysisUnavailable {
    pub sequence_index: u32,
    pub attempts: u32,
    #[source]
    pub reason: VisionError,
}

impl AnalysisUnavailable {
    pub fn new(sequence_index: u32, reason: VisionError) -> Self {
        Self {
            sequence_index,
            attempts: reason.attempts(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            VisionError::from_http_status(429, "", Some(1000)),
            VisionError::RateLimited {
                retry_after_ms: Some(1000)
            }
        ));
        assert!(matches!(
            VisionError::from_http_status(401, "bad key", None),
            VisionError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            VisionError::from_http_status(403, "", None),
            VisionError::Auth { status: 403, .. }
        ));
        assert!(matches!(
            VisionError::from_http_status(503, "", None),
            VisionError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            VisionError::from_http_status(400, "", None),
            VisionError::BadRequest { status: 400, .. }
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VisionError::from_http_status(429, "", None).is_retryable());
        assert!(VisionError::from_http_status(500, "", None).is_retryable());
        assert!(!VisionError::from_http_status(401, "", None).is_retryable());
        assert!(!VisionError::from_http_status(404, "", None).is_retryable());
        assert!(!VisionError::schema_violation("score missing").is_retryable());
    }

    #[test]
    fn test_unavailable_carries_attempts() {
        let exhausted = VisionError::Exhausted {
            attempts: 3,
            last: Box::new(VisionError::from_http_status(503, "overloaded", None)),
        };
        let err = AnalysisUnavailable::new(2, exhausted);
        assert_eq!(err.sequence_index, 2);
        assert_eq!(err.attempts, 3);
        assert!(err.to_string().contains("frame 2"));
    }
}
