//! Score aggregation and recommendation assembly.
//!
//! All criterion scores live on the canonical 0–100 scale. The weighted
//! overall excludes criteria that scored `None` (e.g. technical accuracy on a
//! behavioral question); by default their weight mass is NOT redistributed,
//! so an excluded criterion reads as a quiet penalty. Callers wanting a pure
//! average of what was measured set `renormalize`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzers::coherence::CoherenceReport;
use crate::analyzers::content::{ReferenceReport, RubricEvaluation};
use crate::analyzers::fluency::{FluencyReport, PaceCategory, PaceReport};
use crate::analyzers::tone::ToneReport;
use crate::analyzers::{AnalyzerKind, AnalyzerResult};

// ────────────────────────────────────────────────────────────────────────────
// Criteria and weights
// ────────────────────────────────────────────────────────────────────────────

/// Scoring criteria feeding the weighted overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Clarity,
    Correctness,
    Structure,
    Relevance,
    Technical,
    Confidence,
}

/// Criterion weight table. The default carries the four classic criteria;
/// technical and confidence inform the report but carry no weight unless a
/// caller assigns them some.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub weights: BTreeMap<Criterion, f64>,
    /// When true, the weighted overall is divided by the weight mass of the
    /// criteria that actually scored, so missing criteria don't penalize.
    pub renormalize: bool,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (Criterion::Clarity, 0.25),
            (Criterion::Correctness, 0.35),
            (Criterion::Structure, 0.25),
            (Criterion::Relevance, 0.15),
        ]);
        Self {
            weights,
            renormalize: false,
        }
    }
}

impl ScoreWeights {
    pub fn with_weight(mut self, criterion: Criterion, weight: f64) -> Self {
        self.weights.insert(criterion, weight);
        self
    }

    pub fn renormalized(mut self) -> Self {
        self.renormalize = true;
        self
    }

    /// Weighted combination over criteria that are both weighted and scored.
    /// Always lands in [0, 100].
    pub fn weighted_overall(&self, scores: &CriterionScores) -> f64 {
        let mut total = 0.0;
        let mut participating_mass = 0.0;
        for (criterion, weight) in &self.weights {
            if let Some(score) = scores.get(*criterion) {
                total += weight * score;
                participating_mass += weight;
            }
        }

        let overall = if self.renormalize && participating_mass > 0.0 {
            total / participating_mass
        } else {
            total
        };
        overall.clamp(0.0, 100.0)
    }
}

/// Per-criterion scores, 0–100; `None` means the criterion was not measured
/// for this utterance and must be excluded from aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriterionScores {
    pub clarity: Option<f64>,
    pub correctness: Option<f64>,
    pub structure: Option<f64>,
    pub relevance: Option<f64>,
    pub technical: Option<f64>,
    pub confidence: Option<f64>,
}

impl CriterionScores {
    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        match criterion {
            Criterion::Clarity => self.clarity,
            Criterion::Correctness => self.correctness,
            Criterion::Structure => self.structure,
            Criterion::Relevance => self.relevance,
            Criterion::Technical => self.technical,
            Criterion::Confidence => self.confidence,
        }
    }

    /// Criterion scores from a rubric evaluation plus the analyzer signals.
    /// Structure blends the rubric's structural score with measured
    /// inter-sentence coherence.
    pub fn from_rubric(
        rubric: &RubricEvaluation,
        coherence: &CoherenceReport,
        tone: &ToneReport,
        technical: Option<f64>,
    ) -> Self {
        Self {
            clarity: Some((rubric.clarity.score * 10.0).clamp(0.0, 100.0)),
            correctness: Some((rubric.content.score * 10.0).clamp(0.0, 100.0)),
            structure: Some(
                ((rubric.structure.score * 10.0 + coherence.canonical_score()) / 2.0)
                    .clamp(0.0, 100.0),
            ),
            relevance: Some((rubric.content.relevance * 10.0).clamp(0.0, 100.0)),
            technical,
            confidence: Some(tone.canonical_score()),
        }
    }

    /// Criterion scores from reference-answer analysis. Clarity has no source
    /// in this mode and stays unmeasured.
    pub fn from_reference(
        reference: &ReferenceReport,
        coherence: &CoherenceReport,
        tone: &ToneReport,
    ) -> Self {
        Self {
            clarity: None,
            correctness: Some(reference.canonical_score()),
            structure: Some(coherence.canonical_score()),
            relevance: Some(reference.key_points.topic_alignment.clamp(0.0, 100.0)),
            technical: None,
            confidence: Some(tone.canonical_score()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recommendations
// ────────────────────────────────────────────────────────────────────────────

/// Ordered most-urgent-first; derive order matters for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub aspect: String,
    pub suggestion: String,
    pub priority: Priority,
}

impl Recommendation {
    pub fn new(aspect: &str, suggestion: impl Into<String>, priority: Priority) -> Self {
        Self {
            aspect: aspect.to_string(),
            suggestion: suggestion.into(),
            priority,
        }
    }
}

/// Stable sort, high priority first. Within a priority band the original
/// derivation order is preserved, so repeated sorting is idempotent.
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by_key(|r| r.priority);
}

/// Recommendations driven by the written-answer analyzers and the rubric.
pub fn written_recommendations(
    coherence: &CoherenceReport,
    tone: &ToneReport,
    rubric: Option<&RubricEvaluation>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if coherence.overall < 0.8 {
        recommendations.push(Recommendation::new(
            "structure",
            "Improve answer flow and coherence between points",
            Priority::High,
        ));
    }
    if tone.confidence < 0.7 {
        recommendations.push(Recommendation::new(
            "delivery",
            "Work on confident delivery of key points",
            Priority::Medium,
        ));
    }
    if let Some(rubric) = rubric {
        for improvement in &rubric.overall.priority_improvements {
            recommendations.push(Recommendation::new(
                "content",
                improvement.clone(),
                Priority::High,
            ));
        }
    }

    sort_recommendations(&mut recommendations);
    recommendations
}

/// Recommendations specific to spoken delivery: hedging language, filler
/// density, and pacing.
pub fn speech_recommendations(
    tone: &ToneReport,
    fluency: &FluencyReport,
    pace: &PaceReport,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if tone.markers.uncertain > 0.3 {
        recommendations.push(Recommendation::new(
            "tone",
            "Use more confident language and avoid uncertain phrases",
            Priority::High,
        ));
    }
    if fluency.filler_words.ratio > 0.1 {
        recommendations.push(Recommendation::new(
            "fluency",
            "Reduce filler words and practice more structured responses",
            Priority::High,
        ));
    }
    if pace.category != PaceCategory::Optimal {
        recommendations.push(Recommendation::new(
            "pace",
            pace.recommendation.clone(),
            Priority::Medium,
        ));
    }

    sort_recommendations(&mut recommendations);
    recommendations
}

// ────────────────────────────────────────────────────────────────────────────
// Reports
// ────────────────────────────────────────────────────────────────────────────

/// Full evaluation of a written (or transcribed) answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: CriterionScores,
    /// Weighted combination of the criterion scores, 0–100.
    pub weighted_overall: f64,
    /// Rubric's own holistic judgment, 0–100, kept separate from the
    /// weighted combination.
    pub overall: Option<f64>,
    /// Per-analyzer detail, keyed by analyzer.
    pub analysis: BTreeMap<AnalyzerKind, AnalyzerResult>,
    /// Sorted most-urgent-first.
    pub recommendations: Vec<Recommendation>,
}

/// Delivery-side breakdown for spoken answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// 0–100 composite of fluency, professional tone, and pace.
    pub score: f64,
    pub tone: AnalyzerResult,
    pub fluency: AnalyzerResult,
    pub pace: PaceReport,
    pub prosody: Option<AnalyzerResult>,
    pub recommendations: Vec<Recommendation>,
}

/// Spoken-answer evaluation: content and delivery sides plus their weighted
/// combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpokenReport {
    pub content: EvaluationReport,
    pub delivery: DeliveryReport,
    /// content × 0.6 + delivery × 0.4, 0–100.
    pub combined: f64,
}

/// Low-latency subset for mid-interview hints. No generative calls back it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickFeedback {
    pub pace: PaceReport,
    pub confidence: f64,
    pub filler_count: usize,
    pub suggestions: Vec<String>,
}

const CONTENT_COMBINED_WEIGHT: f64 = 0.6;
const DELIVERY_COMBINED_WEIGHT: f64 = 0.4;

/// Delivery composite: fluency 0.4, professional tone 0.3, pace 0.3, all on
/// the 0–100 scale.
pub fn delivery_score(fluency: &FluencyReport, tone: &ToneReport, pace: &PaceReport) -> f64 {
    let pace_component = if pace.category == PaceCategory::Optimal {
        100.0
    } else {
        70.0
    };
    (fluency.canonical_score() * 0.4
        + tone.professionalism * 100.0 * 0.3
        + pace_component * 0.3)
        .clamp(0.0, 100.0)
}

pub fn combined_score(content: f64, delivery: f64) -> f64 {
    (content * CONTENT_COMBINED_WEIGHT + delivery * DELIVERY_COMBINED_WEIGHT).clamp(0.0, 100.0)
}
