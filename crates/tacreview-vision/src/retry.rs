//! Retry policy with exponential backoff.
//!
//! Retries on:
//! - Network errors
//! - HTTP 429 (Too Many Requests), honoring Retry-After
//! - HTTP 5xx
//!
//! Everything else surfaces immediately.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{info_span, warn, Instrument};

use crate::error::{VisionError, VisionResult};
use crate::metrics::record_retry;
use crate::transport::{VisionRequest, VisionTransport};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Execute an async operation with retry.
///
/// A retryable error on the last attempt becomes `VisionError::Exhausted`,
/// as does any error that ends a run after earlier attempts failed, so the
/// attempt count survives. A first-attempt non-retryable error is returned
/// as is.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> VisionResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = VisionResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);

    let mut attempt = 0u32;

    loop {
        let span = info_span!("vision_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Vision request failed, retrying: {}",
                    e
                );

                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(VisionError::Exhausted {
                    attempts: max_attempts,
                    last: Box::new(e),
                })
            }
            Err(e) if attempt == 0 => return Err(e),
            Err(e) => {
                return Err(VisionError::Exhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                })
            }
        }
    }
}

/// Delay before the retry following `attempt` (0-based): `base * 2^attempt`
/// capped at `max_delay_ms`. A server-provided delay wins but is capped too.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after.min(config.max_delay_ms));
    }

    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(exp_delay.min(config.max_delay_ms))
}

/// Transport decorator adding retry with backoff.
pub struct RetryingTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T> RetryingTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<T: VisionTransport> VisionTransport for RetryingTransport<T> {
    async fn generate(&self, request: &VisionRequest) -> VisionResult<String> {
        with_retry(&self.config, "generate", || self.inner.generate(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InlineImage;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Transport replaying scripted HTTP statuses; 200 yields "ok".
    struct ScriptedTransport {
        statuses: Mutex<VecDeque<u16>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VisionTransport for ScriptedTransport {
        async fn generate(&self, _request: &VisionRequest) -> VisionResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(503);
            match status {
                200 => Ok("ok".to_string()),
                other => Err(VisionError::from_http_status(other, "scripted", None)),
            }
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_base_delay_ms(1)
            .with_max_delay_ms(5)
    }

    fn request() -> VisionRequest {
        VisionRequest {
            prompt: "p".to_string(),
            image: InlineImage {
                mime_type: "image/jpeg".to_string(),
                data: vec![1, 2, 3],
            },
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 8000);
    }

    #[test]
    fn test_calculate_delay_exponential() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(&config, 0, None), Duration::from_millis(500));
        assert_eq!(calculate_delay(&config, 1, None), Duration::from_millis(1000));
        assert_eq!(calculate_delay(&config, 2, None), Duration::from_millis(2000));
    }

    #[test]
    fn test_calculate_delay_respects_max() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(&config, 10, None), Duration::from_millis(8000));
        assert_eq!(calculate_delay(&config, 64, None), Duration::from_millis(8000));
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let config = RetryConfig::default();
        assert_eq!(
            calculate_delay(&config, 0, Some(2000)),
            Duration::from_millis(2000)
        );
        assert_eq!(
            calculate_delay(&config, 0, Some(60_000)),
            Duration::from_millis(8000)
        );
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let transport = RetryingTransport::new(ScriptedTransport::new(&[429, 429, 200]), fast());
        let text = tokio_test::assert_ok!(transport.generate(&request()).await);
        assert_eq!(text, "ok");
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let transport = RetryingTransport::new(ScriptedTransport::new(&[401, 200]), fast());
        let err = tokio_test::assert_err!(transport.generate(&request()).await);
        assert!(matches!(err, VisionError::Auth { .. }));
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let transport = RetryingTransport::new(ScriptedTransport::new(&[400]), fast());
        let err = transport.generate(&request()).await.unwrap_err();
        assert!(matches!(err, VisionError::BadRequest { status: 400, .. }));
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistent_server_error_exhausts() {
        let transport = RetryingTransport::new(
            ScriptedTransport::new(&[503, 503, 503, 200]),
            fast().with_max_attempts(3),
        );
        let err = transport.generate(&request()).await.unwrap_err();
        match err {
            VisionError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, VisionError::ServerError { status: 503, .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_request_after_retries_keeps_attempt_count() {
        let transport = RetryingTransport::new(ScriptedTransport::new(&[503, 503, 400]), fast());
        let err = tokio_test::assert_err!(transport.generate(&request()).await);
        assert_eq!(err.attempts(), 3);
        match err {
            VisionError::Exhausted { last, .. } => {
                assert!(matches!(*last, VisionError::BadRequest { status: 400, .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let transport =
            RetryingTransport::new(ScriptedTransport::new(&[200]), fast().with_max_attempts(0));
        assert_eq!(transport.generate(&request()).await.unwrap(), "ok");
    }
}
