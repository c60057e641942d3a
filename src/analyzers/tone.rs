//! Tone/sentiment analyzer — categorical emotion scoring via the external
//! text-classification capability plus fixed marker-word densities.
//!
//! Tone feedback is advisory: a failed or empty classification degrades to a
//! neutral default instead of failing the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::capabilities::{LabelScore, TextClassifier};

const CONFIDENCE_LABELS: &[&str] = &["confident", "neutral", "optimism", "optimistic", "approval"];
const NERVOUSNESS_LABELS: &[&str] = &["anxious", "nervousness", "nervous", "uncertain", "fear"];
const PROFESSIONAL_LABELS: &[&str] = &["neutral", "confident", "serious", "approval"];
const UNPROFESSIONAL_LABELS: &[&str] = &["anger", "angry", "aggressive", "sarcastic", "annoyance"];

pub const PROFESSIONAL_MARKERS: &[&str] = &[
    "therefore",
    "consequently",
    "furthermore",
    "moreover",
    "specifically",
];
pub const CONFIDENT_MARKERS: &[&str] =
    &["definitely", "certainly", "absolutely", "clearly", "strongly"];
pub const UNCERTAIN_MARKERS: &[&str] = &["maybe", "perhaps", "possibly", "might", "could be"];
pub const ENTHUSIASTIC_MARKERS: &[&str] = &["excited", "passionate", "love", "enjoy", "fantastic"];

const NEUTRAL_SCORE: f64 = 0.5;

/// Per-category marker densities: occurrences / |marker set|.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDensities {
    pub professional: f64,
    pub confident: f64,
    pub uncertain: f64,
    pub enthusiastic: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneReport {
    /// Raw classifier output; empty when degraded.
    pub emotions: Vec<LabelScore>,
    pub markers: MarkerDensities,
    /// [0, 1], 0.5 is neutral.
    pub confidence: f64,
    /// [0, 1], 0.5 is neutral.
    pub professionalism: f64,
    pub degraded: bool,
}

impl ToneReport {
    /// Canonical 0–100 score: the confidence signal, scaled.
    pub fn canonical_score(&self) -> f64 {
        self.confidence * 100.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        let mut suggestions = Vec::new();
        if self.markers.uncertain > 0.3 {
            suggestions
                .push("Use more confident language and avoid tentative phrases".to_string());
        }
        if self.confidence < 0.4 && !self.degraded {
            suggestions.push("Project more certainty when stating your conclusions".to_string());
        }
        AnalyzerResult {
            kind: AnalyzerKind::Tone,
            score: self.canonical_score(),
            details: json!({
                "emotions": self.emotions,
                "markers": self.markers,
                "confidence": self.confidence,
                "professionalism": self.professionalism,
            }),
            suggestions,
            degraded: self.degraded,
        }
    }
}

/// Signed combination of confidence-set mass minus nervousness-set mass,
/// normalized via `(raw + 1) / 2` and clamped into [0, 1] even for
/// adversarial inputs whose sums fall outside the expected range.
pub fn confidence_score(emotions: &[LabelScore]) -> f64 {
    signed_label_score(emotions, CONFIDENCE_LABELS, NERVOUSNESS_LABELS)
}

/// Same signed combination over professional vs. unprofessional label sets.
pub fn professionalism_score(emotions: &[LabelScore]) -> f64 {
    signed_label_score(emotions, PROFESSIONAL_LABELS, UNPROFESSIONAL_LABELS)
}

fn signed_label_score(emotions: &[LabelScore], positive: &[&str], negative: &[&str]) -> f64 {
    let mass = |labels: &[&str]| {
        emotions
            .iter()
            .filter(|e| labels.contains(&e.label.to_lowercase().as_str()))
            .map(|e| e.score)
            .sum::<f64>()
    };
    ((mass(positive) - mass(negative) + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Occurrence count of each marker in the lowercased text, divided by the
/// size of the marker set.
pub fn marker_density(text: &str, markers: &[&str]) -> f64 {
    if markers.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let occurrences: usize = markers.iter().map(|m| lowered.matches(m).count()).sum();
    occurrences as f64 / markers.len() as f64
}

pub fn marker_densities(text: &str) -> MarkerDensities {
    MarkerDensities {
        professional: marker_density(text, PROFESSIONAL_MARKERS),
        confident: marker_density(text, CONFIDENT_MARKERS),
        uncertain: marker_density(text, UNCERTAIN_MARKERS),
        enthusiastic: marker_density(text, ENTHUSIASTIC_MARKERS),
    }
}

/// Classifies emotional tone. Marker densities are always computed locally;
/// only the classification-derived scores degrade to 0.5 on failure.
pub async fn analyze(text: &str, classifier: &dyn TextClassifier) -> ToneReport {
    let markers = marker_densities(text);

    if text.trim().is_empty() {
        return neutral_report(markers);
    }

    match classifier.classify(text).await {
        Ok(emotions) if !emotions.is_empty() => {
            let confidence = confidence_score(&emotions);
            let professionalism = professionalism_score(&emotions);
            ToneReport {
                emotions,
                markers,
                confidence,
                professionalism,
                degraded: false,
            }
        }
        Ok(_) => {
            warn!("tone classifier returned no labels, using neutral default");
            neutral_report(markers)
        }
        Err(e) => {
            warn!("tone classification failed ({e}), using neutral default");
            neutral_report(markers)
        }
    }
}

fn neutral_report(markers: MarkerDensities) -> ToneReport {
    ToneReport {
        emotions: vec![],
        markers,
        confidence: NEUTRAL_SCORE,
        professionalism: NEUTRAL_SCORE,
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::capabilities::ServiceError;

    struct FixedClassifier(Vec<LabelScore>);

    #[async_trait]
    impl TextClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl TextClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ServiceError> {
            Err(ServiceError::RateLimited { retries: 3 })
        }
    }

    fn ls(label: &str, score: f64) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn test_confidence_score_balanced() {
        let emotions = vec![ls("confident", 0.6), ls("nervousness", 0.2)];
        // (0.6 - 0.2 + 1) / 2 = 0.7
        assert!((confidence_score(&emotions) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_score_clamps_adversarial_input() {
        let emotions = vec![ls("confident", 5.0)];
        assert_eq!(confidence_score(&emotions), 1.0);
        let emotions = vec![ls("nervousness", 5.0)];
        assert_eq!(confidence_score(&emotions), 0.0);
    }

    #[test]
    fn test_professionalism_score_uses_its_label_sets() {
        let emotions = vec![ls("neutral", 0.8), ls("anger", 0.4)];
        // (0.8 - 0.4 + 1) / 2 = 0.7
        assert!((professionalism_score(&emotions) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_marker_density_normalized_by_set_size() {
        // 2 occurrences over 5 professional markers
        let d = marker_density("Therefore we scale. Furthermore it works.", PROFESSIONAL_MARKERS);
        assert!((d - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_marker_density_empty_text() {
        assert_eq!(marker_density("", CONFIDENT_MARKERS), 0.0);
    }

    #[tokio::test]
    async fn test_analyze_happy_path() {
        let classifier = FixedClassifier(vec![ls("confident", 0.5), ls("neutral", 0.3)]);
        let report = analyze("I definitely think this works.", &classifier).await;
        assert!(!report.degraded);
        assert!(report.confidence > 0.5);
        assert!(report.markers.confident > 0.0);
    }

    #[tokio::test]
    async fn test_analyze_degrades_to_neutral_on_failure() {
        let report = analyze("Some answer text.", &FailingClassifier).await;
        assert!(report.degraded);
        assert_eq!(report.confidence, 0.5);
        assert_eq!(report.professionalism, 0.5);
        assert!(report.emotions.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_empty_classification() {
        let report = analyze("Some answer text.", &FixedClassifier(vec![])).await;
        assert!(report.degraded);
        assert_eq!(report.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_empty_text_skips_classification() {
        // FailingClassifier would degrade anyway; what matters is neutral output
        let report = analyze("   ", &FailingClassifier).await;
        assert!(report.degraded);
        assert_eq!(report.canonical_score(), 50.0);
    }

    #[test]
    fn test_uncertainty_markers_produce_suggestion() {
        let markers = MarkerDensities {
            professional: 0.0,
            confident: 0.0,
            uncertain: 0.4,
            enthusiastic: 0.0,
        };
        let report = ToneReport {
            emotions: vec![],
            markers,
            confidence: 0.6,
            professionalism: 0.6,
            degraded: false,
        };
        let result = report.into_result();
        assert!(result
            .suggestions
            .iter()
            .any(|s| s.contains("tentative")));
    }
}
