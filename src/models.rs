//! Input data model — one `Utterance` per submitted answer, immutable once built.

use serde::{Deserialize, Serialize};

use crate::errors::EvalError;

/// Kind of interview question being answered. Drives which analyzers apply
/// (technical accuracy is only estimated for `Technical`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Technical,
    Behavioral,
    #[default]
    General,
}

/// Role/level metadata attached to an answer. All optional; defaults apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerContext {
    pub role: Option<String>,
    pub level: Option<String>,
}

impl AnswerContext {
    pub fn role_or_default(&self) -> &str {
        self.role.as_deref().unwrap_or("the position")
    }
}

/// The unit of evaluation: one fully transcribed candidate answer plus its
/// metadata. Constructed once, consumed by all analyzers, discarded after the
/// report is produced — the caller persists the report, not the utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// Positive; may be an estimate when the caller lacks exact timing.
    pub duration_seconds: f64,
    pub question: String,
    pub question_type: QuestionType,
    /// Reference answer or rubric text. Required for reference-mode content
    /// analysis; ignored in rubric mode.
    pub expected_answer: Option<String>,
    pub context: AnswerContext,
}

impl Utterance {
    /// Validates duration up front. Empty text is NOT an error here —
    /// analyzers return zero/neutral scores for it instead of raising.
    pub fn new(
        text: impl Into<String>,
        duration_seconds: f64,
        question: impl Into<String>,
        question_type: QuestionType,
    ) -> Result<Self, EvalError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(EvalError::InvalidInput(format!(
                "duration_seconds must be positive, got {duration_seconds}"
            )));
        }
        Ok(Self {
            text: text.into(),
            duration_seconds,
            question: question.into(),
            question_type,
            expected_answer: None,
            context: AnswerContext::default(),
        })
    }

    pub fn with_expected_answer(mut self, expected: impl Into<String>) -> Self {
        self.expected_answer = Some(expected.into());
        self
    }

    pub fn with_context(mut self, context: AnswerContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_duration_rejected() {
        assert!(Utterance::new("hi", 0.0, "q", QuestionType::General).is_err());
        assert!(Utterance::new("hi", -3.0, "q", QuestionType::General).is_err());
        assert!(Utterance::new("hi", f64::NAN, "q", QuestionType::General).is_err());
    }

    #[test]
    fn test_empty_text_is_allowed() {
        let u = Utterance::new("", 5.0, "q", QuestionType::General).unwrap();
        assert!(u.text.is_empty());
    }

    #[test]
    fn test_context_role_default() {
        let ctx = AnswerContext::default();
        assert_eq!(ctx.role_or_default(), "the position");
        let ctx = AnswerContext {
            role: Some("backend engineer".to_string()),
            level: None,
        };
        assert_eq!(ctx.role_or_default(), "backend engineer");
    }

    #[test]
    fn test_question_type_serde_lowercase() {
        let qt: QuestionType = serde_json::from_str(r#""technical""#).unwrap();
        assert_eq!(qt, QuestionType::Technical);
        assert_eq!(serde_json::to_string(&QuestionType::Behavioral).unwrap(), r#""behavioral""#);
    }
}
