use thiserror::Error;

use crate::capabilities::ServiceError;

/// Pipeline-level error type.
///
/// Analyzer-local failures are converted to degraded defaults inside each
/// analyzer and never surface here; only correctness-relevant failures
/// (content parse failure, missing required analyzer result) escape
/// `Evaluator::evaluate`.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Utterance text empty where a reference answer is required, duration
    /// non-positive, or an analyzer mode invoked without its inputs.
    /// Raised before any network call is issued.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external capability timed out or kept returning retryable statuses.
    #[error("External service call failed: {0}")]
    Transient(#[source] ServiceError),

    /// An external capability returned data that does not parse against the
    /// expected schema. Typed (not defaulted) for score-bearing analyzers.
    #[error("Malformed response from external service: {0}")]
    MalformedResponse(String),

    /// A required (non-optional) analyzer result is entirely missing.
    #[error("Required analyzer result missing: {0}")]
    MissingAnalyzer(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServiceError> for EvalError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Parse(e) => EvalError::MalformedResponse(e.to_string()),
            ServiceError::EmptyContent => {
                EvalError::MalformedResponse("service returned empty content".to_string())
            }
            other => EvalError::Transient(other),
        }
    }
}
