//! Independent scoring analyzers. Each consumes an immutable view of one
//! utterance (plus raw audio for prosody) and produces an `AnalyzerResult`
//! on the canonical 0–100 scale, or a typed failure where correctness is at
//! stake. No analyzer mutates shared state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod coherence;
pub mod content;
pub mod fluency;
pub mod grammar;
pub mod prosody;
pub mod tone;

/// Identifies which analyzer produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Fluency,
    Tone,
    Coherence,
    Content,
    Grammar,
    Prosody,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Fluency => "fluency",
            AnalyzerKind::Tone => "tone",
            AnalyzerKind::Coherence => "coherence",
            AnalyzerKind::Content => "content",
            AnalyzerKind::Grammar => "grammar",
            AnalyzerKind::Prosody => "prosody",
        }
    }
}

/// Uniform analyzer output consumed by the aggregator.
///
/// Invariant: every analyzer returns one of these (possibly with `degraded`
/// set) or a typed failure — never a partially filled object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub kind: AnalyzerKind,
    /// Canonical 0–100. Analyzers computing on other scales convert here.
    pub score: f64,
    /// Analyzer-specific sub-metrics and extracted instances.
    pub details: Value,
    pub suggestions: Vec<String>,
    /// True when the analyzer fell back to a neutral or simulated result.
    /// Degraded sections still render, marked as reduced-confidence.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&AnalyzerKind::Content).unwrap(),
            r#""content""#
        );
        let kind: AnalyzerKind = serde_json::from_str(r#""prosody""#).unwrap();
        assert_eq!(kind, AnalyzerKind::Prosody);
    }

    #[test]
    fn test_kind_as_str_matches_serde() {
        for kind in [
            AnalyzerKind::Fluency,
            AnalyzerKind::Tone,
            AnalyzerKind::Coherence,
            AnalyzerKind::Content,
            AnalyzerKind::Grammar,
            AnalyzerKind::Prosody,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
