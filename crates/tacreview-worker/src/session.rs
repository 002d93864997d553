//! End-to-end review of one training video.

use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;
use tracing::Instrument;

use tacreview_media::{
    FfmpegFrameDecoder, FfprobeProbe, FrameDecoder, FrameSampler, MediaProbe, VideoValidator,
};
use tacreview_models::{DecodeGap, SampledFrame, SessionId, SessionReport};
use tacreview_vision::GeminiAnalysisClient;

use crate::aggregate::{ReportContext, SummaryAggregator};
use crate::config::WorkerConfig;
use crate::coordinator::{CoordinatorConfig, FrameAnalysisCoordinator, FrameAnalyzer};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SessionLogger;

/// The production pipeline: ffprobe, ffmpeg and Gemini.
pub type GeminiReviewSession = ReviewSession<FfprobeProbe, FfmpegFrameDecoder, GeminiAnalysisClient>;

/// A finished review.
#[derive(Debug)]
pub struct SessionOutput {
    pub report: SessionReport,
    /// The frames that were sent for analysis
    pub frames: Vec<SampledFrame>,
}

/// Validate, sample, analyze and aggregate.
pub struct ReviewSession<P, D, A> {
    validator: VideoValidator<P>,
    sampler: FrameSampler<D>,
    coordinator: FrameAnalysisCoordinator<A>,
    aggregator: SummaryAggregator,
    positions: Vec<f64>,
}

impl GeminiReviewSession {
    /// Build the production pipeline from configuration.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let gemini = config
            .gemini_config()
            .ok_or_else(|| WorkerError::config_error("No vision API key configured"))?;
        let prompt = config.load_prompt()?;
        let client = GeminiAnalysisClient::gemini(gemini, config.retry_config(), prompt)?;

        Ok(Self::new(FfprobeProbe, FfmpegFrameDecoder::new(), client, config))
    }
}

impl<P, D, A> ReviewSession<P, D, A>
where
    P: MediaProbe,
    D: FrameDecoder,
    A: FrameAnalyzer,
{
    pub fn new(probe: P, decoder: D, analyzer: A, config: &WorkerConfig) -> Self {
        Self {
            validator: VideoValidator::new(probe, config.validation_limits()),
            sampler: FrameSampler::new(decoder, config.sampler_config()),
            coordinator: FrameAnalysisCoordinator::new(
                analyzer,
                CoordinatorConfig {
                    max_concurrent: config.max_concurrent_requests,
                    deadline: Some(config.analysis_timeout),
                },
            ),
            aggregator: SummaryAggregator::new(config.top_findings, config.benchmark_threshold),
            positions: config.frame_positions.clone(),
        }
    }

    /// Review a video.
    ///
    /// Returns a report whenever at least one frame was analyzed; frames
    /// that failed or were cut off by `cancel` or the time budget show up
    /// as gaps.
    pub async fn run(
        &self,
        video: &Path,
        context: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> WorkerResult<SessionOutput> {
        let session_id = SessionId::new();
        let logger = SessionLogger::new(&session_id, "review");
        let span = logger.create_span();

        self.run_session(session_id, &logger, video, context, cancel)
            .instrument(span)
            .await
            .inspect_err(|e| logger.log_error(&e.to_string()))
    }

    async fn run_session(
        &self,
        session_id: SessionId,
        logger: &SessionLogger,
        video: &Path,
        context: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> WorkerResult<SessionOutput> {
        logger.log_start(&video.display().to_string());

        let started = Instant::now();
        let metadata = self
            .validator
            .validate(video)
            .await
            .map_err(WorkerError::from_media)?;
        logger.log_stage(
            "validate",
            started.elapsed(),
            &format!(
                "{:.1}s, {}x{}, {:.1} fps",
                metadata.duration_secs,
                metadata.resolution.width,
                metadata.resolution.height,
                metadata.fps
            ),
        );

        let started = Instant::now();
        let sampled = self
            .sampler
            .sample(&metadata, &self.positions)
            .await
            .map_err(WorkerError::from_media)?;
        let positions_requested = sampled.positions_requested() as u32;
        logger.log_stage(
            "sample",
            started.elapsed(),
            &format!(
                "{} of {} positions decoded",
                sampled.frames.len(),
                positions_requested
            ),
        );

        let decode_gaps: Vec<DecodeGap> = sampled
            .failures
            .into_iter()
            .map(|f| DecodeGap {
                ratio: f.ratio,
                timestamp: f.timestamp,
                reason: f.error.to_string(),
            })
            .collect();
        for gap in &decode_gaps {
            logger.log_warning(&format!(
                "position {:.2} ({:.1}s) not decodable: {}",
                gap.ratio, gap.timestamp, gap.reason
            ));
        }

        let frames = sampled.frames;
        if frames.is_empty() {
            return Err(WorkerError::insufficient_data(format!(
                "None of the {} sampling positions could be decoded",
                positions_requested
            )));
        }

        let started = Instant::now();
        let results = self.coordinator.analyze_all(&frames, context, cancel).await;
        let analyzed = results.values().filter(|o| o.is_success()).count();
        logger.log_stage(
            "analyze",
            started.elapsed(),
            &format!("{} of {} frames analyzed", analyzed, frames.len()),
        );
        for outcome in results.values() {
            if let Some(failure) = outcome.failure() {
                logger.log_frame_gap(
                    outcome.sequence_index,
                    outcome.timestamp,
                    failure.attempts(),
                    &failure.reason(),
                );
            }
        }

        let started = Instant::now();
        let report = self.aggregator.aggregate(
            results,
            ReportContext {
                session_id,
                video: metadata,
                positions_requested,
                decode_gaps,
            },
        )?;
        logger.log_stage(
            "aggregate",
            started.elapsed(),
            &format!("overall {}/100 ({})", report.overall_score, report.rating),
        );

        if report.partial {
            logger.log_warning("Report is partial; some frames never settled");
        }
        logger.log_completion(&format!(
            "{} frame(s) analyzed, {} gap(s)",
            report.coverage.frames_analyzed,
            report.gap_count()
        ));

        Ok(SessionOutput { report, frames })
    }
}
