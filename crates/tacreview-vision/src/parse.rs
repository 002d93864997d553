//! Strict parsing of model output into `FrameAnalysis`.
//!
//! The model's reply is free text that should contain one JSON object.
//! It is deserialized into wire structs, then validated; anything that
//! does not match the expected shape is rejected here so loosely-typed
//! data never travels further down the pipeline.

use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use tacreview_models::{CoverStatus, DetectedEntity, FrameAnalysis};

use crate::error::{VisionError, VisionResult};

/// Model reply as sent on the wire.
#[derive(Debug, Deserialize)]
struct AnalysisReply {
    soldier_positions: Vec<SoldierReply>,
    threats: Vec<ThreatReply>,
    tactical_errors: Vec<String>,
    tactical_strengths: Option<Vec<String>>,
    score: Number,
    formation: Option<String>,
    movement_analysis: Option<MovementReply>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SoldierId {
    Text(String),
    Number(Number),
}

#[derive(Debug, Deserialize)]
struct SoldierReply {
    id: SoldierId,
    x: f64,
    y: f64,
    cover_status: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreatReply {
    x: f64,
    y: f64,
    identified: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
    threat_level: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovementReply {
    formation: Option<String>,
}

/// Remove surrounding markdown code fences, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Clamp a model score into 0-100, returning the raw value when clamped.
pub fn clamp_score(raw: i64) -> (u8, Option<i64>) {
    if (0..=100).contains(&raw) {
        (raw as u8, None)
    } else {
        (raw.clamp(0, 100) as u8, Some(raw))
    }
}

/// Parse and validate a model response for one frame.
pub fn parse_frame_analysis(
    text: &str,
    sequence_index: u32,
    timestamp: f64,
) -> VisionResult<FrameAnalysis> {
    let body = strip_code_fences(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| VisionError::invalid_response(format!("response is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(VisionError::schema_violation("top-level value must be an object"));
    }
    let reply: AnalysisReply = serde_json::from_value(value)
        .map_err(|e| VisionError::schema_violation(e.to_string()))?;

    let mut entities = BTreeMap::new();

    for (i, soldier) in reply.soldier_positions.into_iter().enumerate() {
        let field = format!("soldier_positions[{}]", i);

        let id = match soldier.id {
            SoldierId::Text(s) if !s.trim().is_empty() => s.trim().to_string(),
            SoldierId::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
            _ => {
                return Err(VisionError::schema_violation(format!(
                    "{}.id must be a non-empty string or integer",
                    field
                )))
            }
        };

        let cover = CoverStatus::parse(&soldier.cover_status).ok_or_else(|| {
            VisionError::schema_violation(format!(
                "{}.cover_status has unknown value {:?}",
                field, soldier.cover_status
            ))
        })?;

        let mut entity = DetectedEntity::soldier(soldier.x, soldier.y, cover);
        if let Some(notes) = soldier.notes {
            entity = entity.with_notes(notes);
        }

        let key = format!("soldier-{}", id);
        if entities.insert(key, entity).is_some() {
            return Err(VisionError::schema_violation(format!(
                "duplicate soldier id {:?}",
                id
            )));
        }
    }

    for (i, threat) in reply.threats.into_iter().enumerate() {
        let description = match (threat.kind, threat.threat_level) {
            (Some(kind), Some(level)) => Some(format!("{} ({})", kind, level)),
            (Some(kind), None) => Some(kind),
            (None, Some(level)) => Some(format!("threat level {}", level)),
            (None, None) => None,
        };

        let mut entity = DetectedEntity::threat(threat.x, threat.y, threat.identified);
        if let Some(text) = threat.notes.or(description) {
            entity = entity.with_notes(text);
        }

        entities.insert(format!("threat-{}", i + 1), entity);
    }

    let raw_score = integral(&reply.score).ok_or_else(|| {
        VisionError::schema_violation(format!("score must be an integer, got {}", reply.score))
    })?;
    let (score, raw_score) = clamp_score(raw_score);

    let formation = reply
        .formation
        .or_else(|| reply.movement_analysis.and_then(|m| m.formation))
        .filter(|f| !f.trim().is_empty());

    Ok(FrameAnalysis {
        sequence_index,
        timestamp,
        entities,
        tactical_errors: non_empty(reply.tactical_errors),
        tactical_strengths: non_empty(reply.tactical_strengths.unwrap_or_default()),
        score,
        raw_score,
        formation,
    })
}

/// Trimmed entries, blanks dropped.
fn non_empty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Integral value of a JSON number, saturated into `i64`; `85.0` counts,
/// `85.5` does not.
fn integral(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        return Some(i64::MAX);
    }
    let f = n.as_f64()?;
    // `as` saturates out-of-range floats
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}
