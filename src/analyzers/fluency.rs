//! Lexical/fluency analyzer — filler words, repetitions, sentence complexity,
//! pause markers, and pace. Pure functions of text; the only analyzer with no
//! external calls, so it always succeeds.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::text;

/// Single-token disfluency markers.
pub const FILLER_WORDS: &[&str] = &[
    "um", "uh", "er", "ah", "like", "basically", "actually", "literally", "stuff", "things",
];

/// Two-word disfluency markers, matched over adjacent token pairs.
pub const FILLER_PHRASES: &[&str] = &["you know", "sort of", "kind of"];

/// Clause-connective tokens used to approximate clause count.
const CLAUSE_CONNECTIVES: &[&str] = &[
    "and", "but", "because", "although", "while", "which", "that", "if", "when", "since",
];

const FILLER_WEIGHT: f64 = 0.3;
const REPETITION_WEIGHT: f64 = 0.3;
const COMPLEXITY_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillerInstance {
    pub word: String,
    /// Token index in the word sequence.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillerStats {
    pub count: usize,
    /// count / |words|; 0 when the utterance has no words.
    pub ratio: f64,
    pub instances: Vec<FillerInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repetition {
    pub word: String,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceComplexity {
    pub length: usize,
    pub clauses: usize,
    /// Monotone in both length and clause count, capped at 1.0.
    pub complexity: f64,
}

/// Punctuation-derived pause markers for one sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausePattern {
    pub deliberate_pauses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceCategory {
    Slow,
    Optimal,
    Fast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaceReport {
    pub words_per_minute: f64,
    pub category: PaceCategory,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluencyReport {
    pub filler_words: FillerStats,
    pub repetitions: Vec<Repetition>,
    pub sentence_complexity: Vec<SentenceComplexity>,
    pub pause_patterns: Vec<PausePattern>,
    /// Stdev of sentence lengths in words.
    pub sentence_variety: f64,
    /// 0–10 fluency score as historically reported.
    pub fluency_score: f64,
}

impl FluencyReport {
    /// Canonical 0–100 score for aggregation.
    pub fn canonical_score(&self) -> f64 {
        self.fluency_score * 10.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        let mut suggestions = Vec::new();
        if self.filler_words.ratio > 0.1 {
            suggestions
                .push("Reduce filler words and practice more structured responses".to_string());
        }
        if self.repetitions.len() > 2 {
            suggestions.push("Watch for repeated words; pause instead of restarting".to_string());
        }
        AnalyzerResult {
            kind: AnalyzerKind::Fluency,
            score: self.canonical_score(),
            details: json!({
                "filler_words": self.filler_words,
                "repetitions": self.repetitions,
                "sentence_complexity": self.sentence_complexity,
                "pause_patterns": self.pause_patterns,
                "sentence_variety": self.sentence_variety,
                "fluency_score": self.fluency_score,
            }),
            suggestions,
            degraded: false,
        }
    }
}

/// Counts filler tokens and adjacent filler phrases. Ratio is over the word
/// count; fails closed to 0 for an empty sequence.
pub fn count_filler_words(words: &[String]) -> FillerStats {
    if words.is_empty() {
        return FillerStats {
            count: 0,
            ratio: 0.0,
            instances: vec![],
        };
    }

    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let mut instances = Vec::new();

    for (i, word) in lowered.iter().enumerate() {
        if FILLER_WORDS.contains(&word.as_str()) {
            instances.push(FillerInstance {
                word: words[i].clone(),
                position: i,
            });
        }
    }
    for i in 0..lowered.len().saturating_sub(1) {
        let pair = format!("{} {}", lowered[i], lowered[i + 1]);
        if FILLER_PHRASES.contains(&pair.as_str()) {
            instances.push(FillerInstance {
                word: pair,
                position: i,
            });
        }
    }

    let count = instances.len();
    FillerStats {
        count,
        ratio: count as f64 / words.len() as f64,
        instances,
    }
}

/// Scans consecutive bigrams and flags an adjacent-word repetition when the
/// second word of bigram i equals the first word of bigram i+1
/// (case-insensitive). Equivalent to flagging `w[i] == w[i+1]`.
pub fn detect_repetitions(words: &[String]) -> Vec<Repetition> {
    let mut repetitions = Vec::new();
    for i in 1..words.len() {
        if words[i].to_lowercase() == words[i - 1].to_lowercase() {
            repetitions.push(Repetition {
                word: words[i].clone(),
                position: i,
            });
        }
    }
    repetitions
}

/// Word count plus clause count (approximated via clause-connective tokens),
/// combined into a capped monotone complexity score.
pub fn sentence_complexity(sentence: &str) -> SentenceComplexity {
    let words = text::words(sentence);
    let clauses = 1 + words
        .iter()
        .filter(|w| CLAUSE_CONNECTIVES.contains(&w.to_lowercase().as_str()))
        .count();
    let length = words.len();

    let length_term = (length as f64 / 20.0).min(1.0);
    let clause_term = (clauses as f64 / 4.0).min(1.0);
    let complexity = (length_term * 0.5 + clause_term * 0.5).min(1.0);

    SentenceComplexity {
        length,
        clauses,
        complexity,
    }
}

/// Comma-derived deliberate pauses per sentence.
pub fn pause_patterns(sentences: &[String]) -> Vec<PausePattern> {
    sentences
        .iter()
        .map(|s| PausePattern {
            deliberate_pauses: s.matches(',').count(),
        })
        .collect()
}

/// Stdev of per-sentence word counts. 0 for fewer than two sentences.
pub fn sentence_variety(sentences: &[String]) -> f64 {
    if sentences.len() < 2 {
        return 0.0;
    }
    let lengths: Vec<f64> = sentences
        .iter()
        .map(|s| text::words(s).len() as f64)
        .collect();
    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
    variance.sqrt()
}

/// Weighted fluency combination on the historical 0–10 scale: fillers and
/// repetitions count against, complexity counts for, weights 0.3/0.3/0.4.
pub fn fluency_score(filler_ratio: f64, repetition_count: usize, mean_complexity: f64) -> f64 {
    let filler_term = (1.0 - 2.0 * filler_ratio).max(0.0);
    let repetition_term = (1.0 - repetition_count as f64 / 10.0).max(0.0);
    let complexity_term = mean_complexity.clamp(0.0, 1.0);

    (filler_term * FILLER_WEIGHT
        + repetition_term * REPETITION_WEIGHT
        + complexity_term * COMPLEXITY_WEIGHT)
        * 10.0
}

/// Words-per-minute pace classification against speech-rate benchmarks.
pub fn analyze_pace(word_count: usize, duration_seconds: f64) -> PaceReport {
    let words_per_minute = if duration_seconds > 0.0 {
        word_count as f64 / duration_seconds * 60.0
    } else {
        0.0
    };

    let (category, recommendation) = if words_per_minute < 120.0 {
        (
            PaceCategory::Slow,
            "Try to pick up your pace slightly to keep listeners engaged".to_string(),
        )
    } else if words_per_minute <= 180.0 {
        (
            PaceCategory::Optimal,
            "Your pace is comfortable and easy to follow".to_string(),
        )
    } else {
        (
            PaceCategory::Fast,
            "Slow down slightly so each point lands clearly".to_string(),
        )
    };

    PaceReport {
        words_per_minute,
        category,
        recommendation,
    }
}

/// Runs the full lexical analysis. Empty text yields a zero score and empty
/// instance lists, never a panic.
pub fn analyze(utterance_text: &str) -> FluencyReport {
    let words = text::words(utterance_text);
    let sentences = text::sentences(utterance_text);

    let filler_words = count_filler_words(&words);
    let repetitions = detect_repetitions(&words);
    let complexity: Vec<SentenceComplexity> =
        sentences.iter().map(|s| sentence_complexity(s)).collect();
    let pauses = pause_patterns(&sentences);
    let variety = sentence_variety(&sentences);

    let mean_complexity = if complexity.is_empty() {
        0.0
    } else {
        complexity.iter().map(|c| c.complexity).sum::<f64>() / complexity.len() as f64
    };

    let score = if words.is_empty() {
        0.0
    } else {
        fluency_score(filler_words.ratio, repetitions.len(), mean_complexity)
    };

    FluencyReport {
        filler_words,
        repetitions,
        sentence_complexity: complexity,
        pause_patterns: pauses,
        sentence_variety: variety,
        fluency_score: score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(text: &str) -> Vec<String> {
        text::words(text)
    }

    #[test]
    fn test_scenario_filler_counting() {
        // 10 words, 3 filler instances: "um", "basically", "um"
        let words = w("Um, so, basically I think the answer is um correct.");
        assert_eq!(words.len(), 10);
        let stats = count_filler_words(&words);
        assert_eq!(stats.count, 3);
        assert!((stats.ratio - 0.3).abs() < 1e-9);
        assert_eq!(stats.instances[0].word, "Um");
        assert_eq!(stats.instances[0].position, 0);
    }

    #[test]
    fn test_filler_count_monotone_under_insertion() {
        let base = w("I think the answer is correct");
        let with_fillers = w("I think um the answer is um correct");
        let before = count_filler_words(&base);
        let after = count_filler_words(&with_fillers);
        assert!(after.count > before.count);
        assert!(after.ratio >= before.ratio);
    }

    #[test]
    fn test_filler_phrases_counted() {
        let words = w("it was sort of hard you know");
        let stats = count_filler_words(&words);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn test_empty_words_fails_closed() {
        let stats = count_filler_words(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.ratio, 0.0);
        assert!(stats.instances.is_empty());
    }

    #[test]
    fn test_detect_repetitions_adjacent_case_insensitive() {
        let words = w("the the answer is is correct");
        let reps = detect_repetitions(&words);
        assert_eq!(reps.len(), 2);
        assert_eq!(reps[0].word, "the");
        assert_eq!(reps[0].position, 1);
        assert_eq!(reps[1].word, "is");
    }

    #[test]
    fn test_detect_repetitions_none() {
        assert!(detect_repetitions(&w("a clean fluent sentence")).is_empty());
        assert!(detect_repetitions(&[]).is_empty());
    }

    #[test]
    fn test_sentence_complexity_monotone_and_capped() {
        let short = sentence_complexity("I agree");
        let long = sentence_complexity(
            "I agree because the approach scales and it simplifies testing when the team grows",
        );
        assert!(long.complexity > short.complexity);
        assert!(long.clauses > short.clauses);

        let huge = sentence_complexity(&"word ".repeat(200));
        assert!(huge.complexity <= 1.0);
    }

    #[test]
    fn test_fluency_score_weights() {
        // No fillers, no repetitions, full complexity: 0.3 + 0.3 + 0.4 = 1.0 → 10
        assert!((fluency_score(0.0, 0, 1.0) - 10.0).abs() < 1e-9);
        // Ratio 0.5 zeroes the filler term
        assert!((fluency_score(0.5, 0, 0.0) - 3.0).abs() < 1e-9);
        // 10+ repetitions zero the repetition term
        assert!((fluency_score(0.0, 10, 0.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_filler_heavy_answer_scores_below_clean_one() {
        let filler_heavy = analyze("Um, so, basically I think the answer is um correct.");
        let clean = analyze("So, overall I think the answer here is correct.");
        assert!(filler_heavy.fluency_score < clean.fluency_score);
        assert_eq!(filler_heavy.filler_words.count, 3);
    }

    #[test]
    fn test_empty_utterance_scores_zero() {
        let report = analyze("");
        assert_eq!(report.fluency_score, 0.0);
        assert!(report.filler_words.instances.is_empty());
        assert!(report.repetitions.is_empty());
        assert!(report.sentence_complexity.is_empty());
    }

    #[test]
    fn test_pause_patterns_count_commas() {
        let sentences = vec!["first, second, third".to_string(), "plain".to_string()];
        let pauses = pause_patterns(&sentences);
        assert_eq!(pauses[0].deliberate_pauses, 2);
        assert_eq!(pauses[1].deliberate_pauses, 0);
    }

    #[test]
    fn test_sentence_variety_zero_for_single_sentence() {
        assert_eq!(sentence_variety(&["one sentence only".to_string()]), 0.0);
    }

    #[test]
    fn test_pace_categories() {
        assert_eq!(analyze_pace(20, 60.0).category, PaceCategory::Slow);
        assert_eq!(analyze_pace(150, 60.0).category, PaceCategory::Optimal);
        assert_eq!(analyze_pace(200, 60.0).category, PaceCategory::Fast);
    }

    #[test]
    fn test_canonical_score_is_times_ten() {
        let report = analyze("A clear answer with reasonable structure and no obvious fillers.");
        let result = report.clone().into_result();
        assert!((result.score - report.fluency_score * 10.0).abs() < 1e-9);
        assert!(result.score <= 100.0);
    }
}
