//! External capability contracts consumed at the pipeline boundary.
//!
//! ARCHITECTURAL RULE: no analyzer talks to a third-party API directly.
//! Every external call goes through one of these traits, so tests can swap
//! in doubles and the pipeline never depends on a concrete vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod hf;
pub mod llm;
pub mod prompts;
pub mod transcribe;

pub use hf::HfClient;
pub use llm::LlmClient;
pub use transcribe::{LocalWhisperTranscriber, OpenAiTranscriber};

/// Client-level error shared by all HTTP capability implementations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Service returned empty content")]
    EmptyContent,

    #[error("Subprocess error: {0}")]
    Subprocess(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One categorical label with its probability mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Ordered zero-shot classification outcome, descending by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroShotOutcome {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl ZeroShotOutcome {
    /// The winning label with its score, if the service returned anything.
    pub fn top(&self) -> Option<(&str, f64)> {
        match (self.labels.first(), self.scores.first()) {
            (Some(label), Some(&score)) => Some((label.as_str(), score)),
            _ => None,
        }
    }
}

/// Text classification: emotion/tone and grammatical-acceptability scoring.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError>;
}

/// Pairwise semantic similarity of a source text against candidate texts.
/// Returns one score per candidate, same order.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn similarity(
        &self,
        source: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, ServiceError>;
}

/// Zero-shot classification against caller-supplied candidate labels.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<ZeroShotOutcome, ServiceError>;
}

/// Generative structured completion. The prompt instructs the model to emit
/// JSON; the returned text may still carry surrounding prose or code fences,
/// so consumers parse it defensively (see `llm::extract_json_block`).
#[async_trait]
pub trait StructuredCompleter: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, ServiceError>;
}

/// Speech-to-text over a raw audio buffer.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, ServiceError>;
}
