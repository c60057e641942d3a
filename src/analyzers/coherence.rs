//! Coherence analyzer — adjacent-sentence semantic similarity plus structural
//! heuristics. A single failed pairwise call degrades that pair to a neutral
//! 0.5 instead of zeroing the whole score.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::capabilities::SimilarityScorer;
use crate::text;

const NEUTRAL_SIMILARITY: f64 = 0.5;

const OPENING_MARKERS: &[&str] = &[
    "first",
    "to start",
    "to begin",
    "let me",
    "i would",
    "my approach",
    "in my experience",
];
const CLOSING_MARKERS: &[&str] = &[
    "in conclusion",
    "therefore",
    "to summarize",
    "in summary",
    "overall",
    "finally",
];
/// Word count above which an opening sentence counts as a real introduction
/// even without a marker phrase.
const INTRODUCTION_MIN_WORDS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub sentence_count: usize,
    pub mean_words_per_sentence: f64,
    pub has_introduction: bool,
    pub has_conclusion: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// Mean of per-pair similarities in [0, 1]; 1.0 for a single sentence.
    /// The first sentence's defined 1.0 lives in `sentence_flow` but is
    /// excluded from this mean, so short multi-sentence answers read lower
    /// here than a mean taken over `sentence_flow` would.
    pub overall: f64,
    /// Per-sentence flow scores; the first sentence is defined as 1.0.
    pub sentence_flow: Vec<f64>,
    pub structure: StructureAnalysis,
    /// True when at least one pairwise call fell back to neutral.
    pub degraded: bool,
}

impl CoherenceReport {
    pub fn canonical_score(&self) -> f64 {
        self.overall * 100.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        let mut suggestions = Vec::new();
        if self.overall < 0.8 {
            suggestions.push("Improve answer flow and coherence between points".to_string());
        }
        if !self.structure.has_conclusion && self.structure.sentence_count > 2 {
            suggestions.push("Close with a short summary sentence".to_string());
        }
        AnalyzerResult {
            kind: AnalyzerKind::Coherence,
            score: self.canonical_score(),
            details: json!({
                "overall": self.overall,
                "sentence_flow": self.sentence_flow,
                "structure": self.structure,
            }),
            suggestions,
            degraded: self.degraded,
        }
    }
}

/// Structural sub-analysis: counts, mean length, introduction/conclusion
/// heuristics. Pure function of the sentence sequence.
pub fn analyze_structure(sentences: &[String]) -> StructureAnalysis {
    let sentence_count = sentences.len();
    let total_words: usize = sentences.iter().map(|s| text::words(s).len()).sum();
    let mean_words_per_sentence = if sentence_count > 0 {
        total_words as f64 / sentence_count as f64
    } else {
        0.0
    };

    let has_introduction = sentences.first().map_or(false, |first| {
        let lowered = first.to_lowercase();
        OPENING_MARKERS.iter().any(|m| lowered.contains(m))
            || text::words(first).len() >= INTRODUCTION_MIN_WORDS
    });
    let has_conclusion = sentences.last().map_or(false, |last| {
        let lowered = last.to_lowercase();
        CLOSING_MARKERS.iter().any(|m| lowered.contains(m))
    });

    StructureAnalysis {
        sentence_count,
        mean_words_per_sentence,
        has_introduction,
        has_conclusion,
    }
}

/// Scores inter-sentence flow. Pairwise calls are issued in sentence order;
/// completion order is irrelevant since each result lands in its own slot.
/// A single-sentence utterance scores exactly 1.0 with no calls issued.
pub async fn analyze(sentences: &[String], scorer: &dyn SimilarityScorer) -> CoherenceReport {
    let structure = analyze_structure(sentences);

    if sentences.len() <= 1 {
        return CoherenceReport {
            overall: 1.0,
            sentence_flow: vec![1.0; sentences.len()],
            structure,
            degraded: false,
        };
    }

    let pair_futures = sentences.windows(2).map(|pair| {
        let prev = pair[0].clone();
        let current = pair[1].clone();
        async move {
            match scorer.similarity(&prev, &[current]).await {
                Ok(scores) if !scores.is_empty() => (scores[0].clamp(0.0, 1.0), false),
                Ok(_) => {
                    warn!("similarity call returned no scores, using neutral fallback");
                    (NEUTRAL_SIMILARITY, true)
                }
                Err(e) => {
                    warn!("similarity call failed ({e}), using neutral fallback");
                    (NEUTRAL_SIMILARITY, true)
                }
            }
        }
    });

    let pair_results = join_all(pair_futures).await;
    let degraded = pair_results.iter().any(|(_, fell_back)| *fell_back);
    let pair_scores: Vec<f64> = pair_results.into_iter().map(|(s, _)| s).collect();

    let overall = pair_scores.iter().sum::<f64>() / pair_scores.len() as f64;
    let mut sentence_flow = Vec::with_capacity(sentences.len());
    sentence_flow.push(1.0);
    sentence_flow.extend(&pair_scores);

    CoherenceReport {
        overall,
        sentence_flow,
        structure,
        degraded,
    }
}
