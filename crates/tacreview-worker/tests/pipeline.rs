//! Review session tests with stubbed media tools and vision model.

use async_trait::async_trait;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use tacreview_media::{FrameDecoder, MediaError, MediaProbe, MediaResult, ProbeInfo};
use tacreview_models::{FrameAnalysis, GapKind, SampledFrame};
use tacreview_vision::{
    AnalysisClient, AnalysisUnavailable, PromptTemplate, RetryConfig, RetryingTransport,
    VisionError, VisionRequest, VisionResult, VisionTransport,
};
use tacreview_worker::{FrameAnalyzer, ReportExporter, ReviewSession, WorkerConfig};

struct FixedProbe {
    duration: f64,
}

#[async_trait]
impl MediaProbe for FixedProbe {
    async fn probe(&self, _path: &Path) -> MediaResult<ProbeInfo> {
        Ok(ProbeInfo {
            duration: self.duration,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".to_string(),
        })
    }
}

struct BlankDecoder;

#[async_trait]
impl FrameDecoder for BlankDecoder {
    async fn decode_at(&self, _video: &Path, _timestamp: f64) -> MediaResult<DynamicImage> {
        Ok(DynamicImage::new_rgb8(320, 180))
    }
}

/// Vision model stand-in that is overloaded for the frame at 18.9s.
struct ScriptedModel {
    calls: AtomicUsize,
}

#[async_trait]
impl VisionTransport for ScriptedModel {
    async fn generate(&self, request: &VisionRequest) -> VisionResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("Frame timestamp: 18.9 seconds") {
            return Err(VisionError::from_http_status(503, "model overloaded", None));
        }
        Ok(r#"```json
{
  "soldier_positions": [
    {"id": 1, "x": 120, "y": 300, "cover_status": "full_cover"},
    {"id": 2, "x": 180, "y": 310, "cover_status": "partial"}
  ],
  "threats": [{"x": 600, "y": 90, "identified": true}],
  "tactical_errors": ["Spacing too tight at the breach point"],
  "tactical_strengths": ["Muzzle discipline maintained"],
  "score": 78,
  "formation": "stack"
}
```"#
            .to_string())
    }
}

/// Analyzer that answers frame 0 and never answers the rest.
struct StallingAnalyzer;

#[async_trait]
impl FrameAnalyzer for StallingAnalyzer {
    async fn analyze(
        &self,
        frame: &SampledFrame,
        _context: &str,
    ) -> Result<FrameAnalysis, AnalysisUnavailable> {
        if frame.sequence_index > 0 {
            std::future::pending::<()>().await;
        }
        Ok(FrameAnalysis {
            sequence_index: frame.sequence_index,
            timestamp: frame.timestamp,
            entities: BTreeMap::new(),
            tactical_errors: vec![],
            tactical_strengths: vec![],
            score: 64,
            raw_score: None,
            formation: None,
        })
    }
}

fn video_file(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("breach_drill.mp4");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&[0u8; 2048]).unwrap();
    path
}

fn scripted_client() -> AnalysisClient<RetryingTransport<Arc<ScriptedModel>>> {
    let model = Arc::new(ScriptedModel {
        calls: AtomicUsize::new(0),
    });
    let retry = RetryConfig::default()
        .with_base_delay_ms(1)
        .with_max_delay_ms(5);
    AnalysisClient::new(
        RetryingTransport::new(model, retry),
        PromptTemplate::analysis_default().unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn failed_frame_becomes_a_gap() {
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir);
    let client = scripted_client();
    let session = ReviewSession::new(
        FixedProbe { duration: 37.7 },
        BlankDecoder,
        client,
        &WorkerConfig::default(),
    );

    let output = session.run(&video, "Room clearing", None).await.unwrap();
    let report = &output.report;

    assert_eq!(output.frames.len(), 3);
    assert_eq!(report.coverage.positions_requested, 3);
    assert_eq!(report.coverage.frames_analyzed, 2);
    assert_eq!(report.missing_indices(), vec![1]);
    assert_eq!(report.analysis_gaps[0].kind, GapKind::Unavailable);
    assert_eq!(report.analysis_gaps[0].attempts, 3);
    assert!(!report.partial);

    assert_eq!(report.overall_score, 78);
    assert_eq!(report.cover_statistics.full_cover, 2);
    assert_eq!(report.cover_statistics.partial_cover, 2);
    assert_eq!(report.formations_observed, vec!["stack"]);
    assert_eq!(report.top_errors[0].key, "spacing");
    assert_eq!(report.top_errors[0].frame_count, 2);
    assert!(report.recommendations[0].starts_with("Re-run analysis"));

    let out = tempfile::tempdir().unwrap();
    let paths = ReportExporter::new(out.path())
        .export(report, &output.frames)
        .await
        .unwrap();
    assert!(paths.frames_dir.join("frame_001_18.9s.jpg").exists());
    assert!(!paths.analysis_dir.join("analysis_001_18.9s.json").exists());
    assert!(paths.analysis_dir.join("analysis_002_28.3s.json").exists());
}

#[tokio::test]
async fn cancellation_yields_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir);
    let session = ReviewSession::new(
        FixedProbe { duration: 37.7 },
        BlankDecoder,
        StallingAnalyzer,
        &WorkerConfig::default(),
    );

    let (tx, rx) = watch::channel(false);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).ok();
    };
    let (output, _) = tokio::join!(session.run(&video, "", Some(rx)), cancel);
    let report = output.unwrap().report;

    assert!(report.partial);
    assert_eq!(report.coverage.frames_analyzed, 1);
    assert_eq!(report.missing_indices(), vec![1, 2]);
    assert!(report
        .analysis_gaps
        .iter()
        .all(|g| g.kind == GapKind::Cancelled && g.attempts == 0));
}

#[tokio::test]
async fn deadline_yields_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir);
    let config = WorkerConfig {
        analysis_timeout: Duration::from_millis(200),
        ..WorkerConfig::default()
    };
    let session = ReviewSession::new(
        FixedProbe { duration: 37.7 },
        BlankDecoder,
        StallingAnalyzer,
        &config,
    );

    let report = session.run(&video, "", None).await.unwrap().report;
    assert!(report.partial);
    assert_eq!(report.overall_score, 64);
}

#[tokio::test]
async fn overlong_video_is_rejected_before_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir);
    let session = ReviewSession::new(
        FixedProbe { duration: 130.0 },
        BlankDecoder,
        StallingAnalyzer,
        &WorkerConfig::default(),
    );

    let err = session.run(&video, "", None).await.unwrap_err();
    assert!(err.is_invalid_input());
}

struct BrokenDecoder;

#[async_trait]
impl FrameDecoder for BrokenDecoder {
    async fn decode_at(&self, _video: &Path, timestamp: f64) -> MediaResult<DynamicImage> {
        Err(MediaError::frame_decode(timestamp, "corrupt stream"))
    }
}

#[tokio::test]
async fn no_decodable_frames_is_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir);
    let session = ReviewSession::new(
        FixedProbe { duration: 37.7 },
        BrokenDecoder,
        StallingAnalyzer,
        &WorkerConfig::default(),
    );

    let err = session.run(&video, "", None).await.unwrap_err();
    assert!(err.is_insufficient_data());
}
