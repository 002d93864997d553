//! Per-frame analysis client.

use std::time::Instant;
use tracing::{debug, info, warn};

use tacreview_models::{FrameAnalysis, SampledFrame};

use crate::error::{AnalysisUnavailable, VisionResult};
use crate::metrics::{record_parse_failure, record_score_clamped};
use crate::parse::parse_frame_analysis;
use crate::prompt::{PromptTemplate, ANALYSIS_SLOTS};
use crate::retry::{RetryConfig, RetryingTransport};
use crate::transport::{GeminiConfig, GeminiTransport, InlineImage, VisionRequest, VisionTransport};

/// Production client: Gemini behind the retry decorator.
pub type GeminiAnalysisClient = AnalysisClient<RetryingTransport<GeminiTransport>>;

/// Analyzes sampled frames with a vision model.
pub struct AnalysisClient<T> {
    transport: T,
    prompt: PromptTemplate,
}

impl<T: VisionTransport> AnalysisClient<T> {
    /// Create a client. The template must have exactly the `timestamp`
    /// and `context` slots.
    pub fn new(transport: T, prompt: PromptTemplate) -> VisionResult<Self> {
        prompt.require_slots(&ANALYSIS_SLOTS)?;
        Ok(Self { transport, prompt })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Analyze one frame.
    ///
    /// Every failure, including unusable model output, comes back as
    /// `AnalysisUnavailable` tagged with the frame's sequence index.
    pub async fn analyze(
        &self,
        frame: &SampledFrame,
        context: &str,
    ) -> Result<FrameAnalysis, AnalysisUnavailable> {
        let unavailable = |e| AnalysisUnavailable::new(frame.sequence_index, e);

        let prompt = self
            .prompt
            .analysis_prompt(frame.timestamp, context)
            .map_err(unavailable)?;
        let request = VisionRequest {
            prompt,
            image: InlineImage {
                mime_type: frame.mime_type.clone(),
                data: frame.image.clone(),
            },
        };

        let started = Instant::now();
        let text = self
            .transport
            .generate(&request)
            .await
            .map_err(unavailable)?;
        debug!(
            sequence_index = frame.sequence_index,
            latency_ms = started.elapsed().as_millis() as u64,
            bytes = text.len(),
            "Vision response received"
        );

        let analysis = parse_frame_analysis(&text, frame.sequence_index, frame.timestamp)
            .map_err(|e| {
                record_parse_failure();
                warn!(
                    sequence_index = frame.sequence_index,
                    error = %e,
                    "Unusable vision response"
                );
                unavailable(e)
            })?;

        if let Some(raw) = analysis.raw_score {
            record_score_clamped();
            warn!(
                sequence_index = frame.sequence_index,
                raw_score = raw,
                score = analysis.score,
                "Model score outside 0-100, clamped"
            );
        }

        info!(
            sequence_index = frame.sequence_index,
            timestamp = frame.timestamp,
            score = analysis.score,
            entities = analysis.entities.len(),
            "Frame analyzed"
        );

        Ok(analysis)
    }
}

impl GeminiAnalysisClient {
    /// Build the production client.
    pub fn gemini(
        config: GeminiConfig,
        retry: RetryConfig,
        prompt: PromptTemplate,
    ) -> VisionResult<Self> {
        let transport = RetryingTransport::new(GeminiTransport::new(config)?, retry);
        Self::new(transport, prompt)
    }
}
