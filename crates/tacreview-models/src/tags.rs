//! Tactical tags and performance categories.
//!
//! Tags are derived from the free-text errors and strengths the model
//! returns, using a fixed keyword table. Performance categories are the
//! report's scoring axes; each one is fed by exactly one tag.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword classification of a free-text finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TacticalTag {
    CoverUsage,
    ThreatAwareness,
    Formation,
    Spacing,
    Movement,
    WeaponDiscipline,
}

/// Case-insensitive substring keywords per tag.
const KEYWORDS: &[(TacticalTag, &[&str])] = &[
    (TacticalTag::CoverUsage, &["cover", "exposed", "concealment"]),
    (
        TacticalTag::ThreatAwareness,
        &["threat", "sector", "scan", "blind", "overwatch", "security"],
    ),
    (TacticalTag::Formation, &["formation", "stack", "wedge", "column"]),
    (
        TacticalTag::Spacing,
        &["spacing", "tight", "bunch", "interval", "distance"],
    ),
    (
        TacticalTag::Movement,
        &["movement", "moving", "speed", "pace", "bound", "advance"],
    ),
    (TacticalTag::WeaponDiscipline, &["weapon", "muzzle", "trigger"]),
];

impl TacticalTag {
    pub const ALL: [TacticalTag; 6] = [
        TacticalTag::CoverUsage,
        TacticalTag::ThreatAwareness,
        TacticalTag::Formation,
        TacticalTag::Spacing,
        TacticalTag::Movement,
        TacticalTag::WeaponDiscipline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoverUsage => "cover_usage",
            Self::ThreatAwareness => "threat_awareness",
            Self::Formation => "formation",
            Self::Spacing => "spacing",
            Self::Movement => "movement",
            Self::WeaponDiscipline => "weapon_discipline",
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CoverUsage => "Cover usage",
            Self::ThreatAwareness => "Threat awareness",
            Self::Formation => "Formation",
            Self::Spacing => "Spacing",
            Self::Movement => "Movement",
            Self::WeaponDiscipline => "Weapon discipline",
        }
    }

    /// Classify a finding. A finding may carry several tags; the result
    /// follows `ALL` order and never contains duplicates.
    pub fn classify(text: &str) -> Vec<TacticalTag> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(tag, _)| *tag)
            .collect()
    }

    /// The performance category this tag feeds, if any.
    pub fn category(&self) -> Option<PerformanceCategory> {
        match self {
            Self::CoverUsage => Some(PerformanceCategory::CoverUtilization),
            Self::ThreatAwareness => Some(PerformanceCategory::ThreatAwareness),
            Self::Formation => Some(PerformanceCategory::FormationDiscipline),
            Self::Spacing => Some(PerformanceCategory::Spacing),
            Self::Movement => Some(PerformanceCategory::MovementEfficiency),
            Self::WeaponDiscipline => None,
        }
    }
}

impl fmt::Display for TacticalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scoring axis of the session report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceCategory {
    CoverUtilization,
    ThreatAwareness,
    FormationDiscipline,
    Spacing,
    MovementEfficiency,
}

impl PerformanceCategory {
    pub const ALL: [PerformanceCategory; 5] = [
        PerformanceCategory::CoverUtilization,
        PerformanceCategory::ThreatAwareness,
        PerformanceCategory::FormationDiscipline,
        PerformanceCategory::Spacing,
        PerformanceCategory::MovementEfficiency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoverUtilization => "cover_utilization",
            Self::ThreatAwareness => "threat_awareness",
            Self::FormationDiscipline => "formation_discipline",
            Self::Spacing => "spacing",
            Self::MovementEfficiency => "movement_efficiency",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CoverUtilization => "Cover Utilization",
            Self::ThreatAwareness => "Threat Awareness",
            Self::FormationDiscipline => "Formation Discipline",
            Self::Spacing => "Spacing",
            Self::MovementEfficiency => "Movement Efficiency",
        }
    }

    /// The tag whose observations feed this category.
    pub fn tag(&self) -> TacticalTag {
        match self {
            Self::CoverUtilization => TacticalTag::CoverUsage,
            Self::ThreatAwareness => TacticalTag::ThreatAwareness,
            Self::FormationDiscipline => TacticalTag::Formation,
            Self::Spacing => TacticalTag::Spacing,
            Self::MovementEfficiency => TacticalTag::Movement,
        }
    }
}

impl fmt::Display for PerformanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
