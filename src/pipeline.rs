//! Evaluation pipeline — fans one utterance out to the analyzers
//! concurrently, aggregates criterion scores, and assembles the report.
//!
//! Failure policy: content/correctness analysis is score-bearing and its
//! failures propagate; tone, grammar, and coherence degrade to neutral inside
//! their own analyzers; fluency is pure computation and cannot fail; prosody
//! falls back to the simulated backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::analyzers::content::{self, ReferenceReport, RubricEvaluation};
use crate::analyzers::fluency::FluencyReport;
use crate::analyzers::prosody::{self, ProsodyBackend, SimulatedBackend};
use crate::analyzers::tone::ToneReport;
use crate::analyzers::{coherence, fluency, grammar, tone, AnalyzerKind};
use crate::capabilities::{
    SimilarityScorer, StructuredCompleter, TextClassifier, Transcriber, ZeroShotClassifier,
};
use crate::errors::EvalError;
use crate::models::Utterance;
use crate::report::{
    self, CriterionScores, DeliveryReport, EvaluationReport, QuickFeedback, ScoreWeights,
    SpokenReport,
};
use crate::text;

enum ContentOutcome {
    Rubric {
        rubric: RubricEvaluation,
        technical: Option<f64>,
    },
    Reference(ReferenceReport),
}

/// Written-side evaluation plus the concrete tone/fluency reports, so the
/// spoken flow reuses them instead of re-running analyzers (a flaky classifier
/// must not yield divergent confidence numbers inside one report).
struct WrittenAnalysis {
    report: EvaluationReport,
    tone: ToneReport,
    fluency: FluencyReport,
}

/// Orchestrates the analyzers over shared capability handles. Cheap to clone;
/// all capabilities sit behind `Arc`.
#[derive(Clone)]
pub struct Evaluator {
    classifier: Arc<dyn TextClassifier>,
    similarity: Arc<dyn SimilarityScorer>,
    zero_shot: Arc<dyn ZeroShotClassifier>,
    completer: Arc<dyn StructuredCompleter>,
    acceptability: Option<Arc<dyn TextClassifier>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    prosody_primary: Option<Arc<dyn ProsodyBackend>>,
    prosody_fallback: Arc<SimulatedBackend>,
    weights: ScoreWeights,
}

impl Evaluator {
    pub fn new(
        classifier: Arc<dyn TextClassifier>,
        similarity: Arc<dyn SimilarityScorer>,
        zero_shot: Arc<dyn ZeroShotClassifier>,
        completer: Arc<dyn StructuredCompleter>,
    ) -> Self {
        Self {
            classifier,
            similarity,
            zero_shot,
            completer,
            acceptability: None,
            transcriber: None,
            prosody_primary: None,
            prosody_fallback: Arc::new(SimulatedBackend::new()),
            weights: ScoreWeights::default(),
        }
    }

    /// Classifier for grammatical acceptability. Without one, the grammar
    /// section still renders from local heuristics, marked degraded.
    pub fn with_acceptability_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.acceptability = Some(classifier);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_prosody_backend(mut self, backend: Arc<dyn ProsodyBackend>) -> Self {
        self.prosody_primary = Some(backend);
        self
    }

    pub fn with_prosody_fallback(mut self, fallback: SimulatedBackend) -> Self {
        self.prosody_fallback = Arc::new(fallback);
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Evaluates one answer. Dispatches to reference mode when the utterance
    /// carries an expected answer, rubric mode otherwise.
    pub async fn evaluate(&self, utterance: &Utterance) -> Result<EvaluationReport, EvalError> {
        Ok(self.analyze_written(utterance).await?.report)
    }

    async fn analyze_written(&self, utterance: &Utterance) -> Result<WrittenAnalysis, EvalError> {
        let sentences = text::sentences(&utterance.text);

        // Independent analyzers run concurrently; completion order never
        // affects the report since each result lands in its own slot.
        let (content_outcome, tone_report, coherence_report, grammar_report) = tokio::join!(
            self.content_side(utterance),
            tone::analyze(&utterance.text, self.classifier.as_ref()),
            coherence::analyze(&sentences, self.similarity.as_ref()),
            grammar::analyze(&utterance.text, self.acceptability.as_deref()),
        );
        let content_outcome = content_outcome?;
        let fluency_report = fluency::analyze(&utterance.text);

        let (scores, overall, content_result, rubric) = match content_outcome {
            ContentOutcome::Rubric { rubric, technical } => {
                let scores = CriterionScores::from_rubric(
                    &rubric,
                    &coherence_report,
                    &tone_report,
                    technical,
                );
                let overall = Some((rubric.overall.score * 10.0).clamp(0.0, 100.0));
                (scores, overall, rubric.clone().into_result(), Some(rubric))
            }
            ContentOutcome::Reference(reference) => {
                let scores =
                    CriterionScores::from_reference(&reference, &coherence_report, &tone_report);
                (scores, None, reference.into_result(), None)
            }
        };

        let weighted_overall = self.weights.weighted_overall(&scores);
        let recommendations =
            report::written_recommendations(&coherence_report, &tone_report, rubric.as_ref());

        let mut analysis = BTreeMap::new();
        analysis.insert(AnalyzerKind::Content, content_result);
        analysis.insert(AnalyzerKind::Tone, tone_report.clone().into_result());
        analysis.insert(AnalyzerKind::Coherence, coherence_report.into_result());
        analysis.insert(AnalyzerKind::Fluency, fluency_report.clone().into_result());
        analysis.insert(AnalyzerKind::Grammar, grammar_report.into_result());

        info!(
            weighted_overall,
            degraded = analysis.values().any(|a| a.degraded),
            "evaluation complete"
        );

        Ok(WrittenAnalysis {
            report: EvaluationReport {
                scores,
                weighted_overall,
                overall,
                analysis,
                recommendations,
            },
            tone: tone_report,
            fluency: fluency_report,
        })
    }

    /// Evaluates a spoken answer: the written evaluation plus the delivery
    /// side (tone, fluency, pace, prosody), combined 0.6/0.4.
    pub async fn evaluate_spoken(
        &self,
        utterance: &Utterance,
        audio: &[u8],
    ) -> Result<SpokenReport, EvalError> {
        let (written, prosody_report) = tokio::join!(
            self.analyze_written(utterance),
            self.prosody(audio),
        );
        let WrittenAnalysis {
            report: written,
            tone: tone_report,
            fluency: fluency_report,
        } = written?;

        let word_count = text::words(&utterance.text).len();
        let pace = fluency::analyze_pace(word_count, utterance.duration_seconds);

        let score = report::delivery_score(&fluency_report, &tone_report, &pace);
        let recommendations =
            report::speech_recommendations(&tone_report, &fluency_report, &pace);

        let delivery = DeliveryReport {
            score,
            tone: tone_report.into_result(),
            fluency: fluency_report.into_result(),
            pace,
            prosody: Some(prosody_report.into_result()),
            recommendations,
        };

        let combined = report::combined_score(written.weighted_overall, delivery.score);
        debug!(combined, "spoken evaluation complete");

        Ok(SpokenReport {
            content: written,
            delivery,
            combined,
        })
    }

    /// Low-latency subset for mid-interview hints. Issues no generative
    /// calls; the classifier call degrades to neutral if slow or failing.
    pub async fn quick_feedback(&self, utterance: &Utterance) -> QuickFeedback {
        let tone_report = tone::analyze(&utterance.text, self.classifier.as_ref()).await;
        let fluency_report = fluency::analyze(&utterance.text);
        let word_count = text::words(&utterance.text).len();
        let pace = fluency::analyze_pace(word_count, utterance.duration_seconds);

        let suggestions = report::speech_recommendations(&tone_report, &fluency_report, &pace)
            .into_iter()
            .map(|r| r.suggestion)
            .collect();

        QuickFeedback {
            pace,
            confidence: tone_report.confidence,
            filler_count: fluency_report.filler_words.count,
            suggestions,
        }
    }

    /// Transcribes raw audio via the configured transcriber.
    pub async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, EvalError> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or(EvalError::MissingAnalyzer("transcriber"))?;
        let transcript = transcriber.transcribe(audio, language).await?;
        Ok(transcript)
    }

    async fn content_side(&self, utterance: &Utterance) -> Result<ContentOutcome, EvalError> {
        let has_reference = utterance
            .expected_answer
            .as_deref()
            .map_or(false, |e| !e.trim().is_empty());

        if has_reference {
            let reference = content::analyze_reference(
                utterance,
                self.similarity.as_ref(),
                self.zero_shot.as_ref(),
            )
            .await?;
            Ok(ContentOutcome::Reference(reference))
        } else {
            let (rubric, technical) = tokio::join!(
                content::analyze_rubric(utterance, self.completer.as_ref()),
                content::technical_accuracy(utterance, self.completer.as_ref()),
            );
            Ok(ContentOutcome::Rubric {
                rubric: rubric?,
                technical: technical?,
            })
        }
    }

    async fn prosody(&self, audio: &[u8]) -> prosody::ProsodyReport {
        let primary: &dyn ProsodyBackend = match &self.prosody_primary {
            Some(primary) => primary.as_ref(),
            None => self.prosody_fallback.as_ref(),
        };
        prosody::analyze(audio, primary, &self.prosody_fallback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::capabilities::{LabelScore, ServiceError, ZeroShotOutcome};
    use crate::models::QuestionType;

    const RUBRIC_JSON: &str = r#"{
        "clarity": {"score": 8, "strengths": [], "improvements": []},
        "structure": {"score": 6, "has_introduction": true, "has_main_points": true, "has_conclusion": false, "improvements": []},
        "content": {"score": 7, "relevance": 9, "depth": 6, "key_points": [], "missing_elements": []},
        "delivery": {"conciseness": 7, "articulation_score": 7, "improvements": []},
        "overall": {"score": 7, "summary": "good", "top_strengths": [], "priority_improvements": ["quantify impact"]}
    }"#;

    struct StubClassifier;

    #[async_trait]
    impl TextClassifier for StubClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ServiceError> {
            Ok(vec![LabelScore {
                label: "confident".to_string(),
                score: 0.6,
            }])
        }
    }

    struct CountingClassifier {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TextClassifier for CountingClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ServiceError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![LabelScore {
                label: "confident".to_string(),
                score: 0.6,
            }])
        }
    }

    struct StubAcceptability(f64);

    #[async_trait]
    impl TextClassifier for StubAcceptability {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ServiceError> {
            Ok(vec![LabelScore {
                label: "LABEL_1".to_string(),
                score: self.0,
            }])
        }
    }

    struct StubSimilarity(f64);

    #[async_trait]
    impl SimilarityScorer for StubSimilarity {
        async fn similarity(
            &self,
            _source: &str,
            candidates: &[String],
        ) -> Result<Vec<f64>, ServiceError> {
            Ok(vec![self.0; candidates.len()])
        }
    }

    struct StubZeroShot;

    #[async_trait]
    impl ZeroShotClassifier for StubZeroShot {
        async fn classify(
            &self,
            _text: &str,
            labels: &[&str],
        ) -> Result<ZeroShotOutcome, ServiceError> {
            Ok(ZeroShotOutcome {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                scores: vec![0.7, 0.2, 0.1],
            })
        }
    }

    struct StubCompleter(String);

    #[async_trait]
    impl StructuredCompleter for StubCompleter {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, ServiceError> {
            Ok(self.0.clone())
        }
    }

    /// Proves a path issues no generative calls.
    struct PanickingCompleter;

    #[async_trait]
    impl StructuredCompleter for PanickingCompleter {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, ServiceError> {
            panic!("generative completion must not be called on this path");
        }
    }

    struct StubTranscriber;

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _audio: &[u8], _language: &str) -> Result<String, ServiceError> {
            Ok("transcribed text".to_string())
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn evaluator(completer: Arc<dyn StructuredCompleter>) -> Evaluator {
        init_tracing();
        Evaluator::new(
            Arc::new(StubClassifier),
            Arc::new(StubSimilarity(0.8)),
            Arc::new(StubZeroShot),
            completer,
        )
        .with_prosody_fallback(SimulatedBackend::seeded(11))
    }

    fn utterance(text: &str) -> Utterance {
        Utterance::new(text, 30.0, "Tell me about caching", QuestionType::General).unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_rubric_mode_scores_and_overall() {
        let ev = evaluator(Arc::new(StubCompleter(RUBRIC_JSON.to_string())));
        let report = ev
            .evaluate(&utterance(
                "Caching reduces latency. It also lowers database load.",
            ))
            .await
            .unwrap();

        assert_eq!(report.scores.clarity, Some(80.0));
        assert_eq!(report.scores.correctness, Some(70.0));
        assert_eq!(report.scores.relevance, Some(90.0));
        // structure = (60 + coherence*100) / 2, coherence stubbed at 0.8
        assert_eq!(report.scores.structure, Some(70.0));
        assert!(report.scores.technical.is_none());
        assert_eq!(report.overall, Some(70.0));
        assert!(report.weighted_overall > 0.0 && report.weighted_overall <= 100.0);
        assert_eq!(report.analysis.len(), 5);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.suggestion == "quantify impact"));
    }

    #[tokio::test]
    async fn test_evaluate_reference_mode_dispatch() {
        // PanickingCompleter proves rubric mode is skipped entirely.
        let ev = evaluator(Arc::new(PanickingCompleter));
        let u = utterance("Caching reduces latency and lowers database load.")
            .with_expected_answer("Caching reduces latency. It lowers database load for reads.");
        let report = ev.evaluate(&u).await.unwrap();

        assert!(report.scores.clarity.is_none());
        assert_eq!(report.scores.correctness, Some(80.0));
        assert!(report.overall.is_none());
    }

    #[tokio::test]
    async fn test_malformed_rubric_rejects_evaluation() {
        let ev = evaluator(Arc::new(StubCompleter(
            "I'd rather not answer in JSON today.".to_string(),
        )));
        let err = ev.evaluate(&utterance("Some answer.")).await.unwrap_err();
        assert!(matches!(err, EvalError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_evaluate_spoken_combines_sides() {
        let ev = evaluator(Arc::new(StubCompleter(RUBRIC_JSON.to_string())));
        let report = ev
            .evaluate_spoken(
                &utterance("Caching reduces latency. It also lowers database load."),
                &[],
            )
            .await
            .unwrap();

        let expected =
            report::combined_score(report.content.weighted_overall, report.delivery.score);
        assert!((report.combined - expected).abs() < 1e-9);
        // No primary backend configured, so prosody is simulated.
        let prosody = report.delivery.prosody.as_ref().unwrap();
        assert!(prosody.degraded);
        assert_eq!(prosody.kind, AnalyzerKind::Prosody);
    }

    #[tokio::test]
    async fn test_grammar_section_degraded_without_acceptability_classifier() {
        let ev = evaluator(Arc::new(StubCompleter(RUBRIC_JSON.to_string())));
        let report = ev
            .evaluate(&utterance("Caching reduces latency. It also lowers database load."))
            .await
            .unwrap();

        let grammar = report.analysis.get(&AnalyzerKind::Grammar).unwrap();
        assert!(grammar.degraded);
        assert_eq!(grammar.score, 50.0);
    }

    #[tokio::test]
    async fn test_grammar_section_scored_with_acceptability_classifier() {
        let ev = evaluator(Arc::new(StubCompleter(RUBRIC_JSON.to_string())))
            .with_acceptability_classifier(Arc::new(StubAcceptability(0.9)));
        let report = ev
            .evaluate(&utterance("Caching reduces latency. It also lowers database load."))
            .await
            .unwrap();

        let grammar = report.analysis.get(&AnalyzerKind::Grammar).unwrap();
        assert!(!grammar.degraded);
        assert_eq!(grammar.score, 90.0);
        assert_eq!(grammar.details["is_acceptable"], serde_json::json!(true));
    }

    /// The spoken flow reuses the written-side tone analysis; the emotion
    /// classifier must be hit exactly once per report.
    #[tokio::test]
    async fn test_evaluate_spoken_classifies_tone_once() {
        init_tracing();
        let classifier = Arc::new(CountingClassifier {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let ev = Evaluator::new(
            classifier.clone(),
            Arc::new(StubSimilarity(0.8)),
            Arc::new(StubZeroShot),
            Arc::new(StubCompleter(RUBRIC_JSON.to_string())),
        )
        .with_prosody_fallback(SimulatedBackend::seeded(11));

        let report = ev
            .evaluate_spoken(
                &utterance("Caching reduces latency. It also lowers database load."),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(classifier.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        // Both sides of the report carry the same confidence signal.
        let written_tone = report.content.analysis.get(&AnalyzerKind::Tone).unwrap();
        assert_eq!(written_tone.score, report.delivery.tone.score);
    }

    #[tokio::test]
    async fn test_quick_feedback_issues_no_generative_calls() {
        let ev = evaluator(Arc::new(PanickingCompleter));
        let feedback = ev
            .quick_feedback(&utterance("Um, basically this is um my answer here."))
            .await;
        assert!(feedback.filler_count >= 3);
        assert!(feedback.confidence > 0.0);
        assert!(!feedback.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_transcribe_requires_configured_transcriber() {
        let ev = evaluator(Arc::new(PanickingCompleter));
        let err = ev.transcribe(&[1, 2, 3], "en").await.unwrap_err();
        assert!(matches!(err, EvalError::MissingAnalyzer("transcriber")));

        let ev = ev.with_transcriber(Arc::new(StubTranscriber));
        let transcript = ev.transcribe(&[1, 2, 3], "en").await.unwrap();
        assert_eq!(transcript, "transcribed text");
    }
}
