//! Persisting session artifacts.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use tacreview_models::{FrameAnalysis, GapKind, SampledFrame, SessionReport};

use crate::error::WorkerResult;

/// Locations of the written artifacts.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub root: PathBuf,
    pub frames_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub summary: PathBuf,
    pub report: PathBuf,
}

/// Writes a session's frames, analyses and report under
/// `<output_dir>/<video stem>/`.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    output_dir: PathBuf,
}

impl ReportExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn export(
        &self,
        report: &SessionReport,
        frames: &[SampledFrame],
    ) -> WorkerResult<ExportPaths> {
        let root = self.output_dir.join(report.video.stem());
        let paths = ExportPaths {
            frames_dir: root.join("frames"),
            analysis_dir: root.join("analysis"),
            summary: root.join("summary.json"),
            report: root.join("report.txt"),
            root,
        };

        fs::create_dir_all(&paths.frames_dir).await?;
        fs::create_dir_all(&paths.analysis_dir).await?;

        for frame in frames {
            fs::write(paths.frames_dir.join(frame.file_name()), &frame.image).await?;
        }

        for analysis in &report.frames {
            let json = serde_json::to_vec_pretty(analysis)?;
            fs::write(paths.analysis_dir.join(analysis_file_name(analysis)), json).await?;
        }

        fs::write(&paths.summary, serde_json::to_vec_pretty(report)?).await?;
        fs::write(&paths.report, render_text(report)).await?;

        info!(
            root = %paths.root.display(),
            frames = frames.len(),
            analyses = report.frames.len(),
            "Exported session artifacts"
        );

        Ok(paths)
    }
}

pub fn analysis_file_name(analysis: &FrameAnalysis) -> String {
    format!(
        "analysis_{:03}_{:.1}s.json",
        analysis.sequence_index, analysis.timestamp
    )
}

/// Human-readable rendering of a session report.
pub fn render_text(report: &SessionReport) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "URBAN WARFARE TRAINING ANALYSIS REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Session: {}", report.session_id);
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Video: {}", report.video.file_name);
    let _ = writeln!(
        out,
        "Duration: {:.1}s | Resolution: {}x{} | {:.1} MB",
        report.video.duration_secs,
        report.video.resolution.width,
        report.video.resolution.height,
        report.video.size_mb()
    );
    let _ = writeln!(
        out,
        "Frames analyzed: {} of {} requested",
        report.coverage.frames_analyzed, report.coverage.positions_requested
    );
    if report.partial {
        let _ = writeln!(out, "NOTE: partial report, the run ended before every frame settled");
    }

    section(&mut out, "OVERALL PERFORMANCE");
    let _ = writeln!(out, "Score: {}/100 ({})", report.overall_score, report.rating);
    let _ = writeln!(
        out,
        "Frame range: {} - {} (spread {})",
        report.score_range.min,
        report.score_range.max,
        report.score_range.spread()
    );
    if !report.formations_observed.is_empty() {
        let _ = writeln!(out, "Formations: {}", report.formations_observed.join(", "));
    }

    section(&mut out, "FRAME SCORES");
    for frame in &report.frames {
        let clamped = if frame.was_clamped() { " (clamped)" } else { "" };
        let _ = writeln!(
            out,
            "Frame {:>2} @ {:>6.1}s: {:>3}/100{}  soldiers: {}",
            frame.sequence_index,
            frame.timestamp,
            frame.score,
            clamped,
            frame.soldier_count()
        );
    }

    if report.has_gaps() {
        section(&mut out, "COVERAGE GAPS");
        for gap in &report.analysis_gaps {
            let _ = writeln!(
                out,
                "Frame {:>2} @ {:>6.1}s: {} after {} attempt(s): {}",
                gap.sequence_index,
                gap.timestamp,
                match gap.kind {
                    GapKind::Unavailable => "unavailable",
                    GapKind::Cancelled => "cancelled",
                },
                gap.attempts,
                gap.reason
            );
        }
        for gap in &report.decode_gaps {
            let _ = writeln!(
                out,
                "Position {:.2} @ {:>6.1}s: not decodable: {}",
                gap.ratio, gap.timestamp, gap.reason
            );
        }
    }

    section(&mut out, "CATEGORY SCORES");
    for (category, score) in &report.category_scores {
        let _ = writeln!(out, "{:<22} {:>3}/100", category.label(), score);
    }

    section(&mut out, "COVER STATISTICS");
    let stats = &report.cover_statistics;
    let _ = writeln!(out, "Full cover:    {}", stats.full_cover);
    let _ = writeln!(out, "Partial cover: {}", stats.partial_cover);
    let _ = writeln!(out, "No cover:      {}", stats.no_cover);
    let _ = writeln!(out, "Exposed:       {}", stats.exposed);

    section(&mut out, "TOP TACTICAL ERRORS");
    if report.top_errors.is_empty() {
        let _ = writeln!(out, "None observed");
    }
    for (i, finding) in report.top_errors.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({} frame(s))",
            i + 1,
            finding.label(),
            finding.frame_count
        );
    }

    section(&mut out, "TOP STRENGTHS");
    if report.top_strengths.is_empty() {
        let _ = writeln!(out, "None observed");
    }
    for (i, finding) in report.top_strengths.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({} frame(s))",
            i + 1,
            finding.label(),
            finding.frame_count
        );
    }

    section(&mut out, "RECOMMENDATIONS");
    for (i, rec) in report.recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, rec);
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}
