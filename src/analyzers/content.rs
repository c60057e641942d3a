//! Content/correctness analyzer. Two operating modes:
//!
//! - Reference mode: semantic similarity against an expected answer, a
//!   three-way zero-shot classification, and key-point phrase-overlap checks.
//! - Rubric mode: a structured generative evaluation parsed defensively.
//!
//! Correctness data is score-bearing, so malformed responses surface as typed
//! failures here instead of degrading to defaults.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::debug;

use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::capabilities::llm::{extract_json_block, strip_json_fences};
use crate::capabilities::prompts::{
    fill, RUBRIC_PROMPT_TEMPLATE, RUBRIC_SYSTEM, TECHNICAL_ACCURACY_PROMPT_TEMPLATE,
    TECHNICAL_ACCURACY_SYSTEM,
};
use crate::capabilities::{SimilarityScorer, StructuredCompleter, ZeroShotClassifier};
use crate::errors::EvalError;
use crate::models::{QuestionType, Utterance};
use crate::text;

const CORRECTNESS_LABELS: &[&str] = &["correct", "partially correct", "incorrect"];
/// Key points shorter than this many characters are discarded as fragments.
const KEY_POINT_MIN_CHARS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Reference-answer mode
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectnessLabel {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPointCheck {
    pub total: usize,
    pub included: Vec<String>,
    pub missing: Vec<String>,
    /// |included| / |key points| × 100; 100 when there are no key points.
    pub topic_alignment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceReport {
    /// Semantic similarity of candidate vs expected answer, in [0, 1].
    pub similarity: f64,
    pub classification: CorrectnessLabel,
    pub key_points: KeyPointCheck,
    pub suggestions: Vec<String>,
}

impl ReferenceReport {
    /// Canonical 0–100 score: the similarity signal, scaled.
    pub fn canonical_score(&self) -> f64 {
        self.similarity * 100.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        AnalyzerResult {
            kind: AnalyzerKind::Content,
            score: self.canonical_score(),
            details: json!({
                "mode": "reference",
                "similarity": self.similarity,
                "classification": self.classification,
                "key_points": self.key_points,
            }),
            suggestions: self.suggestions.clone(),
            degraded: false,
        }
    }
}

/// Splits the expected answer into sentences and keeps those long enough to
/// carry a point.
pub fn extract_key_points(expected_answer: &str) -> Vec<String> {
    text::sentences(expected_answer)
        .into_iter()
        .filter(|point| point.len() > KEY_POINT_MIN_CHARS)
        .collect()
}

/// Sliding 2- and 3-word windows over a key point, used for overlap checks.
fn phrase_windows(point: &str) -> Vec<String> {
    let words = text::words(point);
    let mut phrases = Vec::new();
    for i in 0..words.len().saturating_sub(1) {
        phrases.push(format!("{} {}", words[i], words[i + 1]));
        if i + 2 < words.len() {
            phrases.push(format!("{} {} {}", words[i], words[i + 1], words[i + 2]));
        }
    }
    phrases
}

/// Partitions key points into included/missing by case-insensitive substring
/// match of any 2–3-word window against the candidate answer.
pub fn check_key_points(answer: &str, key_points: &[String]) -> KeyPointCheck {
    let answer_lowered = answer.to_lowercase();
    let mut included = Vec::new();
    let mut missing = Vec::new();

    for point in key_points {
        let covered = phrase_windows(point)
            .iter()
            .any(|phrase| answer_lowered.contains(&phrase.to_lowercase()));
        if covered {
            included.push(point.clone());
        } else {
            missing.push(point.clone());
        }
    }

    let total = key_points.len();
    let topic_alignment = if total > 0 {
        included.len() as f64 / total as f64 * 100.0
    } else {
        100.0
    };

    KeyPointCheck {
        total,
        included,
        missing,
        topic_alignment,
    }
}

fn missing_point_suggestions(missing: &[String]) -> Vec<String> {
    if missing.is_empty() {
        return vec!["Your answer covered all key points. Well done!".to_string()];
    }
    let mut suggestions = vec!["Consider including these points in your answer:".to_string()];
    suggestions.extend(missing.iter().map(|point| format!("- {point}")));
    suggestions
}

/// Reference-answer correctness analysis. Validation fails fast before any
/// network call when the expected answer is missing or the answer is empty.
pub async fn analyze_reference(
    utterance: &Utterance,
    similarity: &dyn SimilarityScorer,
    zero_shot: &dyn ZeroShotClassifier,
) -> Result<ReferenceReport, EvalError> {
    let expected = utterance
        .expected_answer
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            EvalError::InvalidInput("reference-mode analysis requires an expected answer".into())
        })?;
    if utterance.text.trim().is_empty() {
        return Err(EvalError::InvalidInput(
            "cannot score an empty answer against a reference".into(),
        ));
    }

    let similarity_scores = similarity
        .similarity(expected, std::slice::from_ref(&utterance.text))
        .await?;
    let similarity_score = similarity_scores
        .first()
        .copied()
        .ok_or_else(|| EvalError::MalformedResponse("similarity service returned no scores".into()))?
        .clamp(0.0, 1.0);

    let outcome = zero_shot
        .classify(&utterance.text, CORRECTNESS_LABELS)
        .await?;
    let (label, score) = outcome.top().ok_or_else(|| {
        EvalError::MalformedResponse("zero-shot service returned no labels".into())
    })?;

    let key_points = extract_key_points(expected);
    let check = check_key_points(&utterance.text, &key_points);
    let suggestions = missing_point_suggestions(&check.missing);

    debug!(
        similarity = similarity_score,
        label, alignment = check.topic_alignment,
        "reference-mode content analysis complete"
    );

    Ok(ReferenceReport {
        similarity: similarity_score,
        classification: CorrectnessLabel {
            label: label.to_string(),
            score,
        },
        key_points: check,
        suggestions,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Rubric-driven mode
// ────────────────────────────────────────────────────────────────────────────

/// Accepts a score as either a JSON number or a numeric string — generative
/// models routinely return `"7"` where the schema says `7`.
fn flexible_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("non-numeric score: {s:?}"))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricSection {
    #[serde(deserialize_with = "flexible_score")]
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSection {
    #[serde(deserialize_with = "flexible_score")]
    pub score: f64,
    #[serde(default)]
    pub has_introduction: bool,
    #[serde(default)]
    pub has_main_points: bool,
    #[serde(default)]
    pub has_conclusion: bool,
    #[serde(default)]
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(deserialize_with = "flexible_score")]
    pub score: f64,
    #[serde(deserialize_with = "flexible_score")]
    pub relevance: f64,
    #[serde(deserialize_with = "flexible_score")]
    pub depth: f64,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub missing_elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySection {
    #[serde(deserialize_with = "flexible_score")]
    pub conciseness: f64,
    #[serde(deserialize_with = "flexible_score")]
    pub articulation_score: f64,
    #[serde(default)]
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallSection {
    #[serde(deserialize_with = "flexible_score")]
    pub score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub top_strengths: Vec<String>,
    #[serde(default)]
    pub priority_improvements: Vec<String>,
}

/// Full structured rubric evaluation. All section scores are on the 1–10
/// scale the prompt pins; `canonical_*` accessors convert to 0–100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricEvaluation {
    pub clarity: RubricSection,
    pub structure: StructureSection,
    pub content: ContentSection,
    pub delivery: DeliverySection,
    pub overall: OverallSection,
}

impl RubricEvaluation {
    pub fn into_result(self) -> AnalyzerResult {
        let suggestions = self.overall.priority_improvements.clone();
        AnalyzerResult {
            kind: AnalyzerKind::Content,
            score: (self.content.score * 10.0).clamp(0.0, 100.0),
            details: json!({
                "mode": "rubric",
                "clarity": self.clarity,
                "structure": self.structure,
                "content": self.content,
                "delivery": self.delivery,
                "overall": self.overall,
            }),
            suggestions,
            degraded: false,
        }
    }
}

/// Parses a rubric payload out of raw model output: strips code fences,
/// extracts the first balanced `{...}` block, then validates against the
/// schema. Any failure is a typed `MalformedResponse`.
pub fn parse_rubric(raw: &str) -> Result<RubricEvaluation, EvalError> {
    let stripped = strip_json_fences(raw);
    let block = extract_json_block(stripped).ok_or_else(|| {
        EvalError::MalformedResponse("no JSON object found in rubric response".into())
    })?;
    let rubric: RubricEvaluation = serde_json::from_str(block)
        .map_err(|e| EvalError::MalformedResponse(format!("rubric schema mismatch: {e}")))?;

    for (name, score) in [
        ("clarity", rubric.clarity.score),
        ("structure", rubric.structure.score),
        ("content", rubric.content.score),
        ("overall", rubric.overall.score),
    ] {
        if !(0.0..=10.0).contains(&score) {
            return Err(EvalError::MalformedResponse(format!(
                "rubric {name} score {score} outside 0-10"
            )));
        }
    }
    Ok(rubric)
}

/// Requests and parses the rubric evaluation for one utterance.
pub async fn analyze_rubric(
    utterance: &Utterance,
    completer: &dyn StructuredCompleter,
) -> Result<RubricEvaluation, EvalError> {
    let question_type = match utterance.question_type {
        QuestionType::Technical => "technical",
        QuestionType::Behavioral => "behavioral",
        QuestionType::General => "general",
    };
    let prompt = fill(
        RUBRIC_PROMPT_TEMPLATE,
        &[
            ("question_type", question_type),
            ("role", utterance.context.role_or_default()),
            ("question", &utterance.question),
            ("answer", &utterance.text),
        ],
    );

    let raw = completer.complete(&prompt, RUBRIC_SYSTEM).await?;
    parse_rubric(&raw)
}

#[derive(Debug, Deserialize)]
struct AccuracyPayload {
    #[serde(deserialize_with = "flexible_score")]
    accuracy_score: f64,
}

/// Technical-accuracy estimate, 0–100. `None` for non-technical questions —
/// the criterion is then excluded from weighted aggregation.
pub async fn technical_accuracy(
    utterance: &Utterance,
    completer: &dyn StructuredCompleter,
) -> Result<Option<f64>, EvalError> {
    if utterance.question_type != QuestionType::Technical {
        return Ok(None);
    }

    let prompt = fill(
        TECHNICAL_ACCURACY_PROMPT_TEMPLATE,
        &[
            ("role", utterance.context.role_or_default()),
            ("answer", &utterance.text),
        ],
    );
    let raw = completer.complete(&prompt, TECHNICAL_ACCURACY_SYSTEM).await?;

    let stripped = strip_json_fences(&raw);
    let block = extract_json_block(stripped).ok_or_else(|| {
        EvalError::MalformedResponse("no JSON object found in accuracy response".into())
    })?;
    let payload: AccuracyPayload = serde_json::from_str(block)
        .map_err(|e| EvalError::MalformedResponse(format!("accuracy schema mismatch: {e}")))?;

    Ok(Some(payload.accuracy_score.clamp(0.0, 100.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::capabilities::{ServiceError, ZeroShotOutcome};
    use crate::models::QuestionType;

    const VALID_RUBRIC: &str = r#"{
        "clarity": {"score": 7, "strengths": ["direct"], "improvements": []},
        "structure": {"score": 6, "has_introduction": true, "has_main_points": true, "has_conclusion": false, "improvements": ["add a summary"]},
        "content": {"score": 8, "relevance": 9, "depth": 7, "key_points": ["ownership"], "missing_elements": []},
        "delivery": {"conciseness": 6, "articulation_score": 7, "improvements": []},
        "overall": {"score": 7, "summary": "solid", "top_strengths": ["clear"], "priority_improvements": ["quantify impact"]}
    }"#;

    struct FixedCompleter(String);

    #[async_trait]
    impl StructuredCompleter for FixedCompleter {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, ServiceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedSimilarity(Vec<f64>);

    #[async_trait]
    impl SimilarityScorer for FixedSimilarity {
        async fn similarity(
            &self,
            _source: &str,
            _candidates: &[String],
        ) -> Result<Vec<f64>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    struct FixedZeroShot;

    #[async_trait]
    impl ZeroShotClassifier for FixedZeroShot {
        async fn classify(
            &self,
            _text: &str,
            labels: &[&str],
        ) -> Result<ZeroShotOutcome, ServiceError> {
            Ok(ZeroShotOutcome {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                scores: vec![0.8, 0.15, 0.05],
            })
        }
    }

    fn utterance(text: &str, expected: Option<&str>) -> Utterance {
        let mut u = Utterance::new(text, 30.0, "Tell me about caching", QuestionType::General)
            .unwrap();
        if let Some(e) = expected {
            u = u.with_expected_answer(e);
        }
        u
    }

    #[test]
    fn test_extract_key_points_filters_fragments() {
        let points = extract_key_points("Caching reduces latency. Yes. It also lowers load on the database.");
        assert_eq!(points.len(), 2);
        assert!(points[0].contains("latency"));
    }

    #[test]
    fn test_key_point_scenario_two_of_three() {
        let key_points = vec![
            "Caching reduces request latency".to_string(),
            "It lowers database load significantly".to_string(),
            "Invalidation strategy matters most".to_string(),
        ];
        let answer =
            "Caching reduces latency a lot, and it lowers database load when traffic spikes.";
        let check = check_key_points(answer, &key_points);
        assert_eq!(check.included.len(), 2);
        assert_eq!(check.missing.len(), 1);
        assert!((check.topic_alignment - 200.0 / 3.0).abs() < 1e-9);
        assert!(check.missing[0].contains("Invalidation"));
    }

    #[test]
    fn test_key_points_empty_alignment_is_full() {
        let check = check_key_points("anything", &[]);
        assert_eq!(check.topic_alignment, 100.0);
        assert_eq!(check.total, 0);
    }

    #[tokio::test]
    async fn test_reference_mode_requires_expected_answer() {
        let u = utterance("my answer", None);
        let err = analyze_reference(&u, &FixedSimilarity(vec![0.9]), &FixedZeroShot)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_reference_mode_rejects_empty_answer_before_network() {
        let u = utterance("  ", Some("The expected answer text"));
        let err = analyze_reference(&u, &FixedSimilarity(vec![0.9]), &FixedZeroShot)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_reference_mode_happy_path() {
        let u = utterance(
            "Caching reduces latency and lowers database load.",
            Some("Caching reduces latency. It lowers database load across services."),
        );
        let report = analyze_reference(&u, &FixedSimilarity(vec![0.82]), &FixedZeroShot)
            .await
            .unwrap();
        assert!((report.similarity - 0.82).abs() < 1e-9);
        assert_eq!(report.classification.label, "correct");
        assert_eq!(report.key_points.missing.len(), 0);
        assert!(report.suggestions[0].contains("covered all key points"));
    }

    #[test]
    fn test_parse_rubric_plain_json() {
        let rubric = parse_rubric(VALID_RUBRIC).unwrap();
        assert!((rubric.content.score - 8.0).abs() < f64::EPSILON);
        assert_eq!(rubric.overall.priority_improvements.len(), 1);
    }

    #[test]
    fn test_parse_rubric_with_fences_and_prose() {
        let wrapped = format!("Sure! Here is the analysis:\n```json\n{VALID_RUBRIC}\n```");
        // Fence stripping leaves leading prose; the balanced-block extractor
        // must still find the payload.
        let rubric = parse_rubric(&wrapped).unwrap();
        assert!((rubric.clarity.score - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rubric_accepts_string_scores() {
        let raw = VALID_RUBRIC.replace(r#""score": 7"#, r#""score": "7""#);
        let rubric = parse_rubric(&raw).unwrap();
        assert!((rubric.clarity.score - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rubric_no_json_is_typed_failure() {
        let err = parse_rubric("I cannot evaluate this answer, sorry.").unwrap_err();
        assert!(matches!(err, EvalError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rubric_missing_section_is_typed_failure() {
        let err = parse_rubric(r#"{"clarity": {"score": 7}}"#).unwrap_err();
        assert!(matches!(err, EvalError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rubric_out_of_range_score_rejected() {
        let raw = VALID_RUBRIC.replace(r#""score": 8"#, r#""score": 47"#);
        let err = parse_rubric(&raw).unwrap_err();
        assert!(matches!(err, EvalError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_technical_accuracy_none_for_non_technical() {
        let u = utterance("answer", None);
        let accuracy = technical_accuracy(&u, &FixedCompleter(String::new()))
            .await
            .unwrap();
        assert!(accuracy.is_none());
    }

    #[tokio::test]
    async fn test_technical_accuracy_parsed_for_technical() {
        let mut u = utterance("mutexes serialize access", None);
        u.question_type = QuestionType::Technical;
        let completer = FixedCompleter(
            r#"{"accuracy_score": 85, "concepts_mentioned": ["mutex"], "inaccuracies": [], "depth_assessment": "fair"}"#
                .to_string(),
        );
        let accuracy = technical_accuracy(&u, &completer).await.unwrap();
        assert_eq!(accuracy, Some(85.0));
    }

    #[tokio::test]
    async fn test_technical_accuracy_malformed_is_typed_failure() {
        let mut u = utterance("answer", None);
        u.question_type = QuestionType::Technical;
        let err = technical_accuracy(&u, &FixedCompleter("not json".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::MalformedResponse(_)));
    }
}
