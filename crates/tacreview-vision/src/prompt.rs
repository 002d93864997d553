//! Prompt templates with named substitution slots.
//!
//! Slots are written `{name}`. Literal braces are escaped as `{{` and `}}`.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{VisionError, VisionResult};

/// Context used when the caller supplies none.
pub const DEFAULT_CONTEXT: &str = "Urban warfare training exercise";

/// Slots the analysis template must contain.
pub const ANALYSIS_SLOTS: [&str; 2] = ["context", "timestamp"];

/// Built-in analysis prompt.
pub const DEFAULT_ANALYSIS_TEMPLATE: &str = r#"You are a military tactics instructor reviewing a frame from an urban warfare training exercise.

Scenario context: {context}
Frame timestamp: {timestamp} seconds

Assess the unit's tactical performance in this frame:
- Locate every soldier and judge their use of cover.
- Locate every threat and whether the unit has identified it.
- Note tactical errors (spacing, exposure, formation, sectors of fire, weapon discipline).
- Note tactical strengths worth sustaining.
- Score the frame from 0 to 100.

IMPORTANT: Return ONLY a single JSON object with this schema:
{{
  "soldier_positions": [
    {{"id": "1", "x": 0, "y": 0, "cover_status": "full_cover | partial_cover | no_cover | exposed", "notes": "optional"}}
  ],
  "threats": [
    {{"x": 0, "y": 0, "identified": true, "type": "optional", "threat_level": "optional"}}
  ],
  "tactical_errors": ["description"],
  "tactical_strengths": ["description"],
  "movement_analysis": {{"formation": "optional formation name"}},
  "score": 0
}}

Coordinates are pixel positions in the frame. The score must be an integer.
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template.
    pub fn parse(source: &str) -> VisionResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => name.push(ch),
                            Some(ch) => {
                                return Err(VisionError::template(format!(
                                    "invalid character {:?} in slot name",
                                    ch
                                )))
                            }
                            None => return Err(VisionError::template("unclosed '{' in template")),
                        }
                    }
                    if name.is_empty() {
                        return Err(VisionError::template("empty slot name"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(name));
                }
                '}' => return Err(VisionError::template("unmatched '}' in template")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Load and parse a template file.
    pub fn from_file(path: &Path) -> VisionResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            VisionError::template(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&source)
    }

    /// The built-in analysis template.
    pub fn analysis_default() -> VisionResult<Self> {
        Self::parse(DEFAULT_ANALYSIS_TEMPLATE)
    }

    /// Distinct slot names.
    pub fn slots(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Check that the template has exactly the given slots.
    pub fn require_slots(&self, expected: &[&str]) -> VisionResult<()> {
        let found = self.slots();
        let expected: BTreeSet<&str> = expected.iter().copied().collect();
        if found != expected {
            return Err(VisionError::template(format!(
                "expected slots {:?}, found {:?}",
                expected, found
            )));
        }
        Ok(())
    }

    /// Substitute slot values.
    pub fn render(&self, values: &[(&str, &str)]) -> VisionResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| VisionError::template(format!("no value for slot '{}'", name)))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Render the analysis prompt for one frame.
    pub fn analysis_prompt(&self, timestamp: f64, context: &str) -> VisionResult<String> {
        let context = match context.trim() {
            "" => DEFAULT_CONTEXT,
            trimmed => trimmed,
        };
        let timestamp = format!("{:.1}", timestamp);
        self.render(&[("timestamp", &timestamp), ("context", context)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_slots() {
        let template = PromptTemplate::analysis_default().unwrap();
        assert!(template.require_slots(&ANALYSIS_SLOTS).is_ok());
    }

    #[test]
    fn test_render_escapes() {
        let template = PromptTemplate::parse("{{\"t\": {timestamp}}}").unwrap();
        assert_eq!(
            template.render(&[("timestamp", "18.9")]).unwrap(),
            "{\"t\": 18.9}"
        );
    }

    #[test]
    fn test_analysis_prompt_formats_values() {
        let template = PromptTemplate::parse("At {timestamp}s: {context}").unwrap();
        assert_eq!(
            template.analysis_prompt(18.8667, "Room clearing").unwrap(),
            "At 18.9s: Room clearing"
        );
        assert_eq!(
            template.analysis_prompt(9.4, "  ").unwrap(),
            "At 9.4s: Urban warfare training exercise"
        );
    }

    #[test]
    fn test_default_prompt_keeps_json_braces() {
        let prompt = PromptTemplate::analysis_default()
            .unwrap()
            .analysis_prompt(9.4, "Breach drill")
            .unwrap();
        assert!(prompt.contains("\"soldier_positions\": ["));
        assert!(prompt.contains("Scenario context: Breach drill"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(PromptTemplate::parse("open {slot").is_err());
        assert!(PromptTemplate::parse("stray } brace").is_err());
        assert!(PromptTemplate::parse("bad {slot name}").is_err());
        assert!(PromptTemplate::parse("empty {}").is_err());
    }

    #[test]
    fn test_require_slots_mismatch() {
        let template = PromptTemplate::parse("{timestamp} only").unwrap();
        assert!(matches!(
            template.require_slots(&ANALYSIS_SLOTS),
            Err(VisionError::Template(_))
        ));
    }

    #[test]
    fn test_missing_value() {
        let template = PromptTemplate::parse("{a}{b}").unwrap();
        assert!(template.render(&[("a", "x")]).is_err());
    }
}
