//! Per-frame tactical analysis models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of entity detected in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Soldier,
    Threat,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soldier => "soldier",
            Self::Threat => "threat",
        }
    }
}

/// Cover status of a soldier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoverStatus {
    Full,
    Partial,
    None,
    Exposed,
}

impl CoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::None => "none",
            Self::Exposed => "exposed",
        }
    }

    /// Parse the loose spellings models use for cover status.
    ///
    /// Accepts `full`, `full_cover`, `partial`, `partial_cover`, `none`,
    /// `no`, `no_cover`, `exposed` (case-insensitive, `-` or space in place of `_`).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "full" | "full_cover" => Some(Self::Full),
            "partial" | "partial_cover" => Some(Self::Partial),
            "none" | "no" | "no_cover" => Some(Self::None),
            "exposed" => Some(Self::Exposed),
            _ => None,
        }
    }

    /// Protection credit used by cover scoring.
    pub fn protection(&self) -> f64 {
        match self {
            Self::Full => 1.0,
            Self::Partial => 0.5,
            Self::None | Self::Exposed => 0.0,
        }
    }
}

impl fmt::Display for CoverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position of an entity within the frame, in the model's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// An entity the model detected in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedEntity {
    /// Category tag of the entity
    pub kind: EntityKind,

    /// Position in the frame
    pub position: Position,

    /// Cover status (soldiers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverStatus>,

    /// Whether the threat was identified by the unit (threats only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified: Option<bool>,

    /// Free-text notes from the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DetectedEntity {
    /// Create a soldier entity.
    pub fn soldier(x: f64, y: f64, cover: CoverStatus) -> Self {
        Self {
            kind: EntityKind::Soldier,
            position: Position { x, y },
            cover: Some(cover),
            identified: None,
            notes: None,
        }
    }

    /// Create a threat entity.
    pub fn threat(x: f64, y: f64, identified: bool) -> Self {
        Self {
            kind: EntityKind::Threat,
            position: Position { x, y },
            cover: None,
            identified: Some(identified),
            notes: None,
        }
    }

    /// Attach notes to the entity.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Validated tactical analysis of one sampled frame.
///
/// Only produced from a response that passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameAnalysis {
    /// Sequence index of the analyzed frame
    pub sequence_index: u32,

    /// Timestamp of the analyzed frame in seconds
    pub timestamp: f64,

    /// Detected entities keyed by `soldier-{id}` / `threat-{n}`
    pub entities: BTreeMap<String, DetectedEntity>,

    /// Tactical errors observed in the frame
    pub tactical_errors: Vec<String>,

    /// Tactical strengths observed in the frame
    #[serde(default)]
    pub tactical_strengths: Vec<String>,

    /// Frame score (0-100)
    pub score: u8,

    /// Score as returned by the model, when it had to be clamped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<i64>,

    /// Formation reported by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation: Option<String>,
}

impl FrameAnalysis {
    /// Iterate over detected soldiers.
    pub fn soldiers(&self) -> impl Iterator<Item = &DetectedEntity> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::Soldier)
    }

    /// Iterate over detected threats.
    pub fn threats(&self) -> impl Iterator<Item = &DetectedEntity> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::Threat)
    }

    pub fn soldier_count(&self) -> usize {
        self.soldiers().count()
    }

    /// True if the model's score was outside 0-100 and got clamped.
    pub fn was_clamped(&self) -> bool {
        self.raw_score.is_some()
    }

    /// Mean protection credit of the soldiers in this frame, or `None`
    /// when no soldier was detected.
    pub fn cover_ratio(&self) -> Option<f64> {
        let credits: Vec<f64> = self
            .soldiers()
            .map(|s| s.cover.map(|c| c.protection()).unwrap_or(0.0))
            .collect();
        if credits.is_empty() {
            return None;
        }
        Some(credits.iter().sum::<f64>() / credits.len() as f64)
    }

    /// True if every detected threat is flagged as identified.
    ///
    /// Frames without threats count as aware.
    pub fn all_threats_identified(&self) -> bool {
        self.threats().all(|t| t.identified == Some(true))
    }
}
