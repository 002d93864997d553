//! Session report aggregation.
//!
//! Turns the per-frame outcome map into a [`SessionReport`]: frame scores,
//! category scores, ranked findings, gaps and recommendations. Everything
//! here is deterministic; the only input besides the outcomes is the
//! report context assembled by the session runner.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use tacreview_models::{
    AnalysisGap, CoverStatistics, Coverage, DecodeGap, FrameAnalysis, GapKind, PerformanceCategory,
    PerformanceRating, RankedFinding, ScoreRange, SessionId, SessionReport, TacticalTag,
    VideoMetadata,
};

use crate::coordinator::FrameResults;
use crate::error::AggregateError;

/// Signal base for categories without a direct per-frame measure.
const NEUTRAL_BASE: f64 = 0.75;
const ERROR_WEIGHT: f64 = 0.5;
const STRENGTH_WEIGHT: f64 = 0.25;
const SIGNAL_WEIGHT: f64 = 0.6;
const FRAME_SCORE_WEIGHT: f64 = 0.4;
const MAX_EXAMPLES: usize = 3;
const MAX_RECOMMENDATIONS: usize = 5;
/// Frames a tag must appear in before it drives a recommendation.
const RECURRING_FRAMES: u32 = 2;

/// Everything the report needs that does not come from frame outcomes.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub session_id: SessionId,
    pub video: VideoMetadata,
    pub positions_requested: u32,
    pub decode_gaps: Vec<DecodeGap>,
}

/// Builds session reports from frame outcomes.
#[derive(Debug, Clone, Copy)]
pub struct SummaryAggregator {
    top_n: usize,
    benchmark: u8,
}

impl Default for SummaryAggregator {
    fn default() -> Self {
        Self {
            top_n: 5,
            benchmark: 70,
        }
    }
}

impl SummaryAggregator {
    pub fn new(top_n: usize, benchmark: u8) -> Self {
        Self { top_n, benchmark }
    }

    pub fn aggregate(
        &self,
        results: FrameResults,
        ctx: ReportContext,
    ) -> Result<SessionReport, AggregateError> {
        let total = results.len();
        let mut frames = Vec::new();
        let mut analysis_gaps = Vec::new();

        // BTreeMap iteration keeps both lists in sequence order
        for (_, outcome) in results {
            match outcome.result {
                Ok(analysis) => frames.push(analysis),
                Err(failure) => analysis_gaps.push(AnalysisGap {
                    sequence_index: outcome.sequence_index,
                    timestamp: outcome.timestamp,
                    ratio: outcome.ratio,
                    kind: failure.kind(),
                    attempts: failure.attempts(),
                    reason: failure.reason(),
                }),
            }
        }

        if frames.is_empty() {
            return Err(AggregateError::InsufficientData {
                total,
                failed: analysis_gaps.len(),
            });
        }

        let mean_score =
            frames.iter().map(|f| f64::from(f.score)).sum::<f64>() / frames.len() as f64;
        let overall_score = to_score(mean_score);

        let error_tags = tag_frequencies(&frames, |f| &f.tactical_errors);
        let strength_tags = tag_frequencies(&frames, |f| &f.tactical_strengths);

        let category_scores = PerformanceCategory::ALL
            .iter()
            .map(|&category| {
                let s = category_signal(category, &frames, &error_tags, &strength_tags);
                let score = SIGNAL_WEIGHT * 100.0 * s + FRAME_SCORE_WEIGHT * mean_score;
                (category, to_score(score))
            })
            .collect::<BTreeMap<_, _>>();

        let score_range = ScoreRange {
            min: frames.iter().map(|f| f.score).min().unwrap_or(0),
            max: frames.iter().map(|f| f.score).max().unwrap_or(0),
        };

        let mut cover_statistics = CoverStatistics::default();
        for soldier in frames.iter().flat_map(|f| f.soldiers()) {
            if let Some(cover) = soldier.cover {
                cover_statistics.record(cover);
            }
        }

        let mut formations_observed: Vec<String> = Vec::new();
        for formation in frames.iter().filter_map(|f| f.formation.as_deref()) {
            let formation = formation.trim();
            if !formation.is_empty() && !formations_observed.iter().any(|f| f == formation) {
                formations_observed.push(formation.to_string());
            }
        }

        let top_errors = rank_findings(&frames, |f| &f.tactical_errors, self.top_n);
        let top_strengths = rank_findings(&frames, |f| &f.tactical_strengths, self.top_n);

        let gap_count = analysis_gaps.len() + ctx.decode_gaps.len();
        let recommendations =
            self.recommendations(overall_score, gap_count, &error_tags, &strength_tags);

        // Cancelled frames mean the run was cut short before every frame settled
        let partial = analysis_gaps.iter().any(|g| g.kind == GapKind::Cancelled);

        let coverage = Coverage {
            positions_requested: ctx.positions_requested,
            frames_sampled: total as u32,
            frames_analyzed: frames.len() as u32,
        };

        debug!(
            overall_score,
            analyzed = coverage.frames_analyzed,
            gaps = gap_count,
            "Aggregated session report"
        );

        Ok(SessionReport {
            session_id: ctx.session_id,
            generated_at: Utc::now(),
            video: ctx.video,
            frames,
            coverage,
            analysis_gaps,
            decode_gaps: ctx.decode_gaps,
            category_scores,
            top_strengths,
            top_errors,
            overall_score,
            score_range,
            rating: PerformanceRating::from_score(overall_score),
            cover_statistics,
            formations_observed,
            recommendations,
            partial,
        })
    }

    fn recommendations(
        &self,
        overall_score: u8,
        gap_count: usize,
        error_tags: &HashMap<TacticalTag, u32>,
        strength_tags: &HashMap<TacticalTag, u32>,
    ) -> Vec<String> {
        let recurring = |tags: &HashMap<TacticalTag, u32>, tag: TacticalTag| {
            tags.get(&tag).copied().unwrap_or(0) >= RECURRING_FRAMES
        };

        let mut findings = Vec::new();
        if overall_score < self.benchmark {
            findings.push(
                "Additional training recommended on fundamental urban warfare tactics".to_string(),
            );
        }
        if recurring(error_tags, TacticalTag::Spacing) {
            findings.push(
                "Practice spacing drills to maintain proper intervals between team members"
                    .to_string(),
            );
        }
        if recurring(error_tags, TacticalTag::CoverUsage) {
            findings.push(
                "Conduct cover and concealment exercises to reduce exposure during movement"
                    .to_string(),
            );
        }
        if recurring(error_tags, TacticalTag::Formation) {
            findings.push("Drill formation maintenance during room and street movement".to_string());
        }
        if recurring(strength_tags, TacticalTag::WeaponDiscipline) {
            findings.push("Maintain the current high standard of weapon discipline".to_string());
        }
        if recurring(strength_tags, TacticalTag::Formation) {
            findings.push("Continue emphasizing formation discipline in future exercises".to_string());
        }
        if findings.is_empty() {
            findings.push("Continue regular training to maintain current proficiency".to_string());
            findings.push("Introduce more complex scenarios to build on current performance".to_string());
        }

        let mut recommendations = Vec::with_capacity(MAX_RECOMMENDATIONS);
        if gap_count > 0 {
            recommendations.push(format!(
                "Re-run analysis for missing positions ({} frame(s) without analysis)",
                gap_count
            ));
        }
        recommendations.extend(findings);
        recommendations.truncate(MAX_RECOMMENDATIONS);
        recommendations
    }
}

/// Round half away from zero into [0, 100].
fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Number of frames in which each tag appears at least once.
fn tag_frequencies<F>(frames: &[FrameAnalysis], findings: F) -> HashMap<TacticalTag, u32>
where
    F: Fn(&FrameAnalysis) -> &Vec<String>,
{
    let mut counts = HashMap::new();
    for frame in frames {
        let tags: BTreeSet<TacticalTag> = findings(frame)
            .iter()
            .flat_map(|text| TacticalTag::classify(text))
            .collect();
        for tag in tags {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts
}

fn category_signal(
    category: PerformanceCategory,
    frames: &[FrameAnalysis],
    error_tags: &HashMap<TacticalTag, u32>,
    strength_tags: &HashMap<TacticalTag, u32>,
) -> f64 {
    let n = frames.len() as f64;
    let base = match category {
        PerformanceCategory::CoverUtilization => {
            let ratios: Vec<f64> = frames.iter().filter_map(|f| f.cover_ratio()).collect();
            if ratios.is_empty() {
                NEUTRAL_BASE
            } else {
                ratios.iter().sum::<f64>() / ratios.len() as f64
            }
        }
        PerformanceCategory::ThreatAwareness => {
            frames.iter().filter(|f| f.all_threats_identified()).count() as f64 / n
        }
        _ => NEUTRAL_BASE,
    };

    let tag = category.tag();
    let err_ratio = f64::from(error_tags.get(&tag).copied().unwrap_or(0)) / n;
    let str_ratio = f64::from(strength_tags.get(&tag).copied().unwrap_or(0)) / n;

    (base - ERROR_WEIGHT * err_ratio + STRENGTH_WEIGHT * str_ratio).clamp(0.0, 1.0)
}

struct FindingTally {
    tag: Option<TacticalTag>,
    frames: BTreeSet<u32>,
    first: (u32, usize),
    examples: Vec<String>,
}

/// Rank findings by the number of frames they appear in.
///
/// Tagged findings group under their tag, untagged ones under their
/// normalized text. Ties go to the earlier first occurrence.
fn rank_findings<F>(frames: &[FrameAnalysis], findings: F, top_n: usize) -> Vec<RankedFinding>
where
    F: Fn(&FrameAnalysis) -> &Vec<String>,
{
    let mut tallies: HashMap<String, FindingTally> = HashMap::new();

    for frame in frames {
        for (position, text) in findings(frame).iter().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let tags = TacticalTag::classify(text);
            let keys: Vec<(String, Option<TacticalTag>)> = if tags.is_empty() {
                vec![(text.to_lowercase(), None)]
            } else {
                tags.into_iter()
                    .map(|t| (t.as_str().to_string(), Some(t)))
                    .collect()
            };

            for (key, tag) in keys {
                let tally = tallies.entry(key).or_insert_with(|| FindingTally {
                    tag,
                    frames: BTreeSet::new(),
                    first: (frame.sequence_index, position),
                    examples: Vec::new(),
                });
                tally.frames.insert(frame.sequence_index);
                if tally.examples.len() < MAX_EXAMPLES && !tally.examples.iter().any(|e| e == text)
                {
                    tally.examples.push(text.to_string());
                }
            }
        }
    }

    let mut ranked: Vec<(String, FindingTally)> = tallies.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.frames
            .len()
            .cmp(&a.frames.len())
            .then_with(|| a.first.cmp(&b.first))
    });

    ranked
        .into_iter()
        .take(top_n)
        .map(|(key, tally)| RankedFinding {
            key,
            tag: tally.tag,
            frame_count: tally.frames.len() as u32,
            first_seen: tally.first.0,
            examples: tally.examples,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{FrameFailure, FrameOutcome};
    use std::path::PathBuf;
    use tacreview_models::{ContainerFormat, CoverStatus, DetectedEntity, Resolution};
    use tacreview_vision::{AnalysisUnavailable, VisionError};

    fn video() -> VideoMetadata {
        VideoMetadata {
            path: PathBuf::from("/tmp/drill.mp4"),
            file_name: "drill.mp4".to_string(),
            duration_secs: 37.7,
            resolution: Resolution::new(1920, 1080),
            fps: 30.0,
            size_bytes: 12_000_000,
            format: ContainerFormat::Mp4,
            codec: "h264".to_string(),
        }
    }

    fn context(positions: u32) -> ReportContext {
        ReportContext {
            session_id: SessionId::from("test-session"),
            video: video(),
            positions_requested: positions,
            decode_gaps: vec![],
        }
    }

    fn analysis(index: u32, score: u8, errors: &[&str], strengths: &[&str]) -> FrameAnalysis {
        FrameAnalysis {
            sequence_index: index,
            timestamp: index as f64 * 10.0,
            entities: BTreeMap::new(),
            tactical_errors: errors.iter().map(|s| s.to_string()).collect(),
            tactical_strengths: strengths.iter().map(|s| s.to_string()).collect(),
            score,
            raw_score: None,
            formation: None,
        }
    }

    fn success(a: FrameAnalysis) -> (u32, FrameOutcome) {
        (
            a.sequence_index,
            FrameOutcome {
                sequence_index: a.sequence_index,
                timestamp: a.timestamp,
                ratio: 0.5,
                result: Ok(a),
            },
        )
    }

    fn failure(index: u32) -> (u32, FrameOutcome) {
        let reason = VisionError::Exhausted {
            attempts: 3,
            last: Box::new(VisionError::from_http_status(503, "unavailable", None)),
        };
        (
            index,
            FrameOutcome {
                sequence_index: index,
                timestamp: index as f64 * 10.0,
                ratio: 0.5,
                result: Err(FrameFailure::Unavailable(AnalysisUnavailable::new(index, reason))),
            },
        )
    }

    #[test]
    fn test_zero_successes_is_insufficient_data() {
        let results: FrameResults = [failure(0), failure(1)].into_iter().collect();
        let err = SummaryAggregator::default()
            .aggregate(results, context(2))
            .unwrap_err();
        assert_eq!(err, AggregateError::InsufficientData { total: 2, failed: 2 });
    }

    #[test]
    fn test_overall_is_rounded_mean() {
        let results: FrameResults = [
            success(analysis(0, 70, &[], &[])),
            success(analysis(1, 71, &[], &[])),
        ]
        .into_iter()
        .collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(2))
            .unwrap();
        assert_eq!(report.overall_score, 71);
        assert_eq!(report.rating, PerformanceRating::Satisfactory);
        assert_eq!(report.score_range, ScoreRange { min: 70, max: 71 });
    }

    #[test]
    fn test_two_of_three_frames() {
        let results: FrameResults = [
            success(analysis(0, 80, &["Spacing too tight"], &[])),
            failure(1),
            success(analysis(2, 70, &[], &[])),
        ]
        .into_iter()
        .collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(3))
            .unwrap();

        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.overall_score, 75);
        assert_eq!(report.missing_indices(), vec![1]);
        assert_eq!(report.analysis_gaps[0].attempts, 3);
        assert_eq!(report.analysis_gaps[0].kind, GapKind::Unavailable);
        assert!(!report.coverage.is_complete());
        assert!(!report.partial);

        // base 0.75, half the frames carry a spacing error: s = 0.5
        assert_eq!(report.category_score(PerformanceCategory::Spacing), Some(60));
        // untouched categories: s = 0.75
        assert_eq!(report.category_score(PerformanceCategory::MovementEfficiency), Some(75));
        assert!(report.recommendations[0].starts_with("Re-run analysis"));
    }

    #[test]
    fn test_ranking_ties_follow_first_occurrence() {
        let results: FrameResults = [
            success(analysis(0, 60, &["Left flank exposed", "Spacing too tight"], &[])),
            success(analysis(1, 60, &["Bunched up at the door", "Muzzle sweeping teammates"], &[])),
            success(analysis(2, 60, &["Soldier exposed in the open", "Radio call was late"], &[])),
        ]
        .into_iter()
        .collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(3))
            .unwrap();

        let keys: Vec<&str> = report.top_errors.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["cover_usage", "spacing", "weapon_discipline", "radio call was late"]
        );
        assert_eq!(report.top_errors[0].frame_count, 2);
        assert_eq!(
            report.top_errors[0].examples,
            vec!["Left flank exposed", "Soldier exposed in the open"]
        );
        assert_eq!(report.top_errors[3].tag, None);
        assert_eq!(report.top_errors[3].first_seen, 2);
    }

    #[test]
    fn test_cover_and_threat_signals() {
        let mut frame = analysis(0, 90, &[], &[]);
        frame
            .entities
            .insert("soldier-1".to_string(), DetectedEntity::soldier(1.0, 1.0, CoverStatus::Full));
        frame
            .entities
            .insert("soldier-2".to_string(), DetectedEntity::soldier(2.0, 2.0, CoverStatus::Exposed));
        frame
            .entities
            .insert("threat-1".to_string(), DetectedEntity::threat(5.0, 5.0, false));
        frame.formation = Some("wedge".to_string());

        let results: FrameResults = [success(frame)].into_iter().collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(1))
            .unwrap();

        // cover ratio 0.5: 0.6 * 50 + 0.4 * 90 = 66
        assert_eq!(report.category_score(PerformanceCategory::CoverUtilization), Some(66));
        // unidentified threat: 0 + 36
        assert_eq!(report.category_score(PerformanceCategory::ThreatAwareness), Some(36));
        assert_eq!(report.cover_statistics.full_cover, 1);
        assert_eq!(report.cover_statistics.exposed, 1);
        assert_eq!(report.formations_observed, vec!["wedge"]);
    }

    #[test]
    fn test_recommendations() {
        let results: FrameResults = [
            success(analysis(0, 55, &["Spacing too tight"], &["Good muzzle awareness"])),
            success(analysis(1, 58, &["Team bunched in hallway"], &["Weapon discipline maintained"])),
        ]
        .into_iter()
        .collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(2))
            .unwrap();

        assert_eq!(report.recommendations.len(), 3);
        assert!(report.recommendations[0].contains("fundamental"));
        assert!(report.recommendations[1].contains("spacing drills"));
        assert!(report.recommendations[2].contains("weapon discipline"));

        let results: FrameResults = [success(analysis(0, 95, &[], &[]))].into_iter().collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(1))
            .unwrap();
        assert_eq!(report.recommendations.len(), 2);
    }

    #[test]
    fn test_cancelled_frames_mark_report_partial() {
        let cancelled = FrameOutcome {
            sequence_index: 1,
            timestamp: 20.0,
            ratio: 0.75,
            result: Err(FrameFailure::Cancelled),
        };
        let results: FrameResults = [success(analysis(0, 80, &[], &[])), (1, cancelled)]
            .into_iter()
            .collect();
        let report = SummaryAggregator::default()
            .aggregate(results, context(2))
            .unwrap();

        assert!(report.partial);
        assert_eq!(report.analysis_gaps[0].kind, GapKind::Cancelled);
        assert_eq!(report.analysis_gaps[0].attempts, 0);
    }
}
