//! Session report models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::analysis::{CoverStatus, FrameAnalysis};
use crate::tags::{PerformanceCategory, TacticalTag};
use crate::video::VideoMetadata;

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Performance rating band for the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceRating {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
    RequiresRemedialTraining,
}

impl PerformanceRating {
    /// Rating band for a 0-100 score.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Excellent,
            75..=89 => Self::Good,
            60..=74 => Self::Satisfactory,
            50..=59 => Self::NeedsImprovement,
            _ => Self::RequiresRemedialTraining,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::NeedsImprovement => "Needs Improvement",
            Self::RequiresRemedialTraining => "Requires Remedial Training",
        }
    }
}

impl fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How many frames made it through each pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Coverage {
    /// Sampling positions requested
    pub positions_requested: u32,
    /// Frames successfully decoded
    pub frames_sampled: u32,
    /// Frames successfully analyzed
    pub frames_analyzed: u32,
}

impl Coverage {
    /// True if every requested position produced an analysis.
    pub fn is_complete(&self) -> bool {
        self.frames_analyzed == self.positions_requested
    }
}

/// Why a sampled frame has no analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// The analysis call failed or exhausted its retries
    Unavailable,
    /// The run was cancelled before the call settled
    Cancelled,
}

/// A sampled frame without a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisGap {
    pub sequence_index: u32,
    pub timestamp: f64,
    pub ratio: f64,
    pub kind: GapKind,
    /// Attempts made before giving up (0 when cancelled before the first call)
    pub attempts: u32,
    pub reason: String,
}

/// A sampling position that could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DecodeGap {
    pub ratio: f64,
    pub timestamp: f64,
    pub reason: String,
}

/// A ranked strength or improvement area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedFinding {
    /// Ranking key: the tag name, or the normalized text for untagged findings
    pub key: String,
    /// Tag, when the finding was classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TacticalTag>,
    /// Number of analyzed frames in which the finding appeared
    pub frame_count: u32,
    /// Sequence index of the first frame in which it appeared
    pub first_seen: u32,
    /// Verbatim examples, in order of appearance
    pub examples: Vec<String>,
}

impl RankedFinding {
    /// Display label: the tag label or the first example.
    pub fn label(&self) -> &str {
        match self.tag {
            Some(tag) => tag.label(),
            None => self.examples.first().map(String::as_str).unwrap_or(&self.key),
        }
    }
}

/// Soldier counts per cover status across all analyzed frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverStatistics {
    pub full_cover: u32,
    pub partial_cover: u32,
    pub no_cover: u32,
    pub exposed: u32,
}

impl CoverStatistics {
    pub fn record(&mut self, status: CoverStatus) {
        match status {
            CoverStatus::Full => self.full_cover += 1,
            CoverStatus::Partial => self.partial_cover += 1,
            CoverStatus::None => self.no_cover += 1,
            CoverStatus::Exposed => self.exposed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.full_cover + self.partial_cover + self.no_cover + self.exposed
    }
}

/// Lowest and highest frame score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

impl ScoreRange {
    pub fn spread(&self) -> u8 {
        self.max - self.min
    }
}

/// Aggregated performance report for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionReport {
    /// Session identifier
    pub session_id: SessionId,

    /// When the report was generated
    pub generated_at: DateTime<Utc>,

    /// The analyzed video
    pub video: VideoMetadata,

    /// Successful analyses ordered by sequence index
    pub frames: Vec<FrameAnalysis>,

    /// Stage-by-stage frame counts
    pub coverage: Coverage,

    /// Sampled frames without an analysis
    pub analysis_gaps: Vec<AnalysisGap>,

    /// Sampling positions that could not be decoded
    pub decode_gaps: Vec<DecodeGap>,

    /// Score per performance category (0-100)
    pub category_scores: BTreeMap<PerformanceCategory, u8>,

    /// Most frequent strengths
    pub top_strengths: Vec<RankedFinding>,

    /// Most frequent errors (improvement areas)
    pub top_errors: Vec<RankedFinding>,

    /// Rounded mean of the frame scores (0-100)
    pub overall_score: u8,

    /// Lowest and highest frame score
    pub score_range: ScoreRange,

    /// Rating band of the overall score
    pub rating: PerformanceRating,

    /// Soldier counts per cover status
    pub cover_statistics: CoverStatistics,

    /// Distinct formations, in first-seen order
    #[serde(default)]
    pub formations_observed: Vec<String>,

    /// Training recommendations
    pub recommendations: Vec<String>,

    /// True when the run was cut short and some frames never settled
    #[serde(default)]
    pub partial: bool,
}

impl SessionReport {
    /// Total number of missing frames or positions.
    pub fn gap_count(&self) -> usize {
        self.analysis_gaps.len() + self.decode_gaps.len()
    }

    pub fn has_gaps(&self) -> bool {
        self.gap_count() > 0
    }

    /// Sequence indices of sampled frames without an analysis.
    pub fn missing_indices(&self) -> Vec<u32> {
        self.analysis_gaps.iter().map(|g| g.sequence_index).collect()
    }

    /// Look up the analysis of a frame by sequence index.
    pub fn frame(&self, sequence_index: u32) -> Option<&FrameAnalysis> {
        self.frames
            .binary_search_by_key(&sequence_index, |f| f.sequence_index)
            .ok()
            .map(|i| &self.frames[i])
    }

    pub fn category_score(&self, category: PerformanceCategory) -> Option<u8> {
        self.category_scores.get(&category).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bands() {
        assert_eq!(PerformanceRating::from_score(100), PerformanceRating::Excellent);
        assert_eq!(PerformanceRating::from_score(90), PerformanceRating::Excellent);
        assert_eq!(PerformanceRating::from_score(89), PerformanceRating::Good);
        assert_eq!(PerformanceRating::from_score(75), PerformanceRating::Good);
        assert_eq!(PerformanceRating::from_score(60), PerformanceRating::Satisfactory);
        assert_eq!(
            PerformanceRating::from_score(50),
            PerformanceRating::NeedsImprovement
        );
        assert_eq!(
            PerformanceRating::from_score(49),
            PerformanceRating::RequiresRemedialTraining
        );
    }

    #[test]
    fn test_cover_statistics() {
        let mut stats = CoverStatistics::default();
        stats.record(CoverStatus::Full);
        stats.record(CoverStatus::Full);
        stats.record(CoverStatus::Exposed);
        assert_eq!(stats.full_cover, 2);
        assert_eq!(stats.exposed, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_coverage_complete() {
        let coverage = Coverage {
            positions_requested: 3,
            frames_sampled: 3,
            frames_analyzed: 2,
        };
        assert!(!coverage.is_complete());
    }

    #[test]
    fn test_ranked_finding_label() {
        let tagged = RankedFinding {
            key: "spacing".to_string(),
            tag: Some(TacticalTag::Spacing),
            frame_count: 2,
            first_seen: 0,
            examples: vec!["Spacing too tight".to_string()],
        };
        assert_eq!(tagged.label(), "Spacing");

        let untagged = RankedFinding {
            key: "radio call was late".to_string(),
            tag: None,
            frame_count: 1,
            first_seen: 1,
            examples: vec!["Radio call was late".to_string()],
        };
        assert_eq!(untagged.label(), "Radio call was late");
    }
}
