//! Bounded concurrent analysis of sampled frames.
//!
//! Every input frame gets exactly one entry in the result map, whether its
//! analysis succeeded, failed, or never settled because the run was
//! cancelled or ran out of time.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use tacreview_models::{FrameAnalysis, GapKind, SampledFrame};
use tacreview_vision::{AnalysisClient, AnalysisUnavailable, VisionTransport};

/// Analyzes one frame.
#[async_trait]
pub trait FrameAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        frame: &SampledFrame,
        context: &str,
    ) -> Result<FrameAnalysis, AnalysisUnavailable>;
}

#[async_trait]
impl<T: VisionTransport> FrameAnalyzer for AnalysisClient<T> {
    async fn analyze(
        &self,
        frame: &SampledFrame,
        context: &str,
    ) -> Result<FrameAnalysis, AnalysisUnavailable> {
        AnalysisClient::analyze(self, frame, context).await
    }
}

#[async_trait]
impl<A: FrameAnalyzer + ?Sized> FrameAnalyzer for Arc<A> {
    async fn analyze(
        &self,
        frame: &SampledFrame,
        context: &str,
    ) -> Result<FrameAnalysis, AnalysisUnavailable> {
        (**self).analyze(frame, context).await
    }
}

/// Why a frame has no analysis.
#[derive(Debug)]
pub enum FrameFailure {
    /// The analysis call failed or exhausted its retries
    Unavailable(AnalysisUnavailable),
    /// The run was cancelled or timed out before the call settled
    Cancelled,
}

impl FrameFailure {
    pub fn kind(&self) -> GapKind {
        match self {
            FrameFailure::Unavailable(_) => GapKind::Unavailable,
            FrameFailure::Cancelled => GapKind::Cancelled,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            FrameFailure::Unavailable(e) => e.attempts,
            FrameFailure::Cancelled => 0,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            FrameFailure::Unavailable(e) => e.reason.to_string(),
            FrameFailure::Cancelled => "analysis cancelled before completion".to_string(),
        }
    }
}

/// Settled state of one frame.
#[derive(Debug)]
pub struct FrameOutcome {
    pub sequence_index: u32,
    pub timestamp: f64,
    pub ratio: f64,
    pub result: Result<FrameAnalysis, FrameFailure>,
}

impl FrameOutcome {
    fn new(frame: &SampledFrame, result: Result<FrameAnalysis, FrameFailure>) -> Self {
        Self {
            sequence_index: frame.sequence_index,
            timestamp: frame.timestamp,
            ratio: frame.ratio,
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn analysis(&self) -> Option<&FrameAnalysis> {
        self.result.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&FrameFailure> {
        self.result.as_ref().err()
    }
}

/// Outcome per sequence index.
pub type FrameResults = BTreeMap<u32, FrameOutcome>;

/// Coordinator settings.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Maximum simultaneous analysis calls
    pub max_concurrent: usize,
    /// Time budget for the whole fan-out
    pub deadline: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            deadline: None,
        }
    }
}

/// Fans frame analyses out to an analyzer with a concurrency bound.
pub struct FrameAnalysisCoordinator<A> {
    analyzer: A,
    config: CoordinatorConfig,
}

impl<A: FrameAnalyzer> FrameAnalysisCoordinator<A> {
    pub fn new(analyzer: A, config: CoordinatorConfig) -> Self {
        Self { analyzer, config }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Concurrency limit for a batch of `frame_count` frames.
    pub fn concurrency_limit(&self, frame_count: usize) -> usize {
        self.config.max_concurrent.min(frame_count).max(1)
    }

    /// Analyze every frame and wait for all of them to settle.
    ///
    /// When `cancel` flips to `true` or the deadline passes, in-flight
    /// calls are dropped and unsettled frames are recorded as cancelled.
    pub async fn analyze_all(
        &self,
        frames: &[SampledFrame],
        context: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> FrameResults {
        let mut results = FrameResults::new();
        if frames.is_empty() {
            return results;
        }

        let limit = self.concurrency_limit(frames.len());
        let semaphore = Arc::new(Semaphore::new(limit));
        info!(frames = frames.len(), limit, "Starting frame analysis");

        let mut pending: FuturesUnordered<_> = frames
            .iter()
            .map(|frame| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => return (frame, Err(FrameFailure::Cancelled)),
                    };
                    debug!(sequence_index = frame.sequence_index, "Analyzing frame");
                    let result = self
                        .analyzer
                        .analyze(frame, context)
                        .await
                        .map_err(FrameFailure::Unavailable);
                    (frame, result)
                }
            })
            .collect();

        let deadline = self.config.deadline;
        let timed_out = async move {
            match deadline {
                Some(budget) => tokio::time::sleep(budget).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timed_out);

        let cancelled = wait_for_cancel(cancel);
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some((frame, result)) => {
                        if let Err(FrameFailure::Unavailable(e)) = &result {
                            warn!(
                                sequence_index = frame.sequence_index,
                                attempts = e.attempts,
                                error = %e.reason,
                                "Frame analysis failed"
                            );
                        }
                        results.insert(frame.sequence_index, FrameOutcome::new(frame, result));
                    }
                    None => break,
                },
                _ = &mut timed_out => {
                    warn!(unsettled = frames.len() - results.len(), "Analysis time budget exhausted");
                    break;
                }
                _ = &mut cancelled => {
                    warn!(unsettled = frames.len() - results.len(), "Analysis cancelled");
                    break;
                }
            }
        }

        // Drop in-flight calls before recording them as cancelled
        drop(pending);

        for frame in frames {
            results
                .entry(frame.sequence_index)
                .or_insert_with(|| FrameOutcome::new(frame, Err(FrameFailure::Cancelled)));
        }

        let succeeded = results.values().filter(|o| o.is_success()).count();
        info!(
            frames = frames.len(),
            succeeded,
            failed = frames.len() - succeeded,
            "Frame analysis settled"
        );

        results
    }
}

/// Resolves once the signal reads `true`. Never resolves without a
/// signal or after its sender is dropped.
async fn wait_for_cancel(cancel: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
