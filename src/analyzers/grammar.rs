//! Grammar/clarity analyzer — grammatical-acceptability scoring via the
//! external text-classification capability, plus local error heuristics
//! (repeated words, sentence fragments) and a sentence-length clarity
//! assessment.
//!
//! Grammar feedback is advisory: a failed acceptability call degrades to a
//! neutral score; the local heuristics always run.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::analyzers::fluency::{detect_repetitions, Repetition};
use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::capabilities::TextClassifier;
use crate::text;

/// Acceptability above this reads as grammatically correct.
const ACCEPTABLE_THRESHOLD: f64 = 0.7;
/// Non-empty sentences shorter than this many characters are flagged as
/// possible fragments.
const FRAGMENT_MAX_CHARS: usize = 15;
const NEUTRAL_ACCEPTABILITY: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarityAssessment {
    /// [0, 1].
    pub score: f64,
    pub level: String,
    pub mean_words_per_sentence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarReport {
    /// Acceptability probability in [0, 1]; 0.5 when degraded.
    pub acceptability: f64,
    pub is_acceptable: bool,
    pub clarity: ClarityAssessment,
    pub repeated_words: Vec<Repetition>,
    pub fragments: Vec<String>,
    pub degraded: bool,
}

impl GrammarReport {
    /// Canonical 0–100 score: the acceptability signal, scaled.
    pub fn canonical_score(&self) -> f64 {
        self.acceptability * 100.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        let suggestions = grammar_suggestions(&self.repeated_words, &self.fragments);
        AnalyzerResult {
            kind: AnalyzerKind::Grammar,
            score: self.canonical_score(),
            details: json!({
                "acceptability": self.acceptability,
                "is_acceptable": self.is_acceptable,
                "clarity": self.clarity,
                "repeated_words": self.repeated_words,
                "fragments": self.fragments,
            }),
            suggestions,
            degraded: self.degraded,
        }
    }
}

/// Non-empty sentences too short to plausibly be complete.
pub fn detect_fragments(sentences: &[String]) -> Vec<String> {
    sentences
        .iter()
        .filter(|s| !s.is_empty() && s.len() < FRAGMENT_MAX_CHARS)
        .cloned()
        .collect()
}

/// Sentence-length clarity buckets: under 10 mean words/sentence reads as
/// simplistic, over 25 as hard to follow.
pub fn assess_clarity(utterance_text: &str) -> ClarityAssessment {
    let sentences = text::sentences(utterance_text);
    let total_words = text::words(utterance_text).len();

    if sentences.is_empty() {
        return ClarityAssessment {
            score: 0.0,
            level: "poor".to_string(),
            mean_words_per_sentence: 0.0,
        };
    }

    let mean = total_words as f64 / sentences.len() as f64;
    let (score, level) = if mean < 10.0 {
        (0.5, "somewhat clear, but potentially too simplistic")
    } else if mean > 25.0 {
        (0.3, "potentially unclear - sentences are quite long")
    } else {
        (0.9, "good")
    };

    ClarityAssessment {
        score,
        level: level.to_string(),
        mean_words_per_sentence: mean,
    }
}

fn grammar_suggestions(repeated: &[Repetition], fragments: &[String]) -> Vec<String> {
    let mut suggestions = Vec::new();
    if !repeated.is_empty() {
        let words: Vec<&str> = repeated.iter().map(|r| r.word.as_str()).collect();
        suggestions.push(format!("Avoid word repetition: {}", words.join(", ")));
    }
    if !fragments.is_empty() {
        suggestions.push("Try to use complete sentences instead of fragments.".to_string());
    }
    if suggestions.is_empty() {
        suggestions.push("Your grammar appears to be good.".to_string());
    }
    suggestions
}

/// Runs the grammar analysis. The error heuristics and clarity assessment are
/// always computed locally; only the acceptability score degrades to neutral
/// when the classifier fails, returns nothing, or is not configured.
pub async fn analyze(
    utterance_text: &str,
    classifier: Option<&dyn TextClassifier>,
) -> GrammarReport {
    let words = text::words(utterance_text);
    let sentences = text::sentences(utterance_text);
    let repeated_words = detect_repetitions(&words);
    let fragments = detect_fragments(&sentences);
    let clarity = assess_clarity(utterance_text);

    let (acceptability, degraded) = match classifier {
        Some(classifier) if !utterance_text.trim().is_empty() => {
            match classifier.classify(utterance_text).await {
                Ok(labels) if !labels.is_empty() => (labels[0].score.clamp(0.0, 1.0), false),
                Ok(_) => {
                    warn!("acceptability classifier returned no labels, using neutral default");
                    (NEUTRAL_ACCEPTABILITY, true)
                }
                Err(e) => {
                    warn!("acceptability classification failed ({e}), using neutral default");
                    (NEUTRAL_ACCEPTABILITY, true)
                }
            }
        }
        _ => (NEUTRAL_ACCEPTABILITY, true),
    };

    GrammarReport {
        acceptability,
        is_acceptable: acceptability > ACCEPTABLE_THRESHOLD,
        clarity,
        repeated_words,
        fragments,
        degraded,
    }
}
