//! HuggingFace inference client backing the classification and similarity
//! capabilities. One client, three trait implementations, shared retry loop.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    LabelScore, ServiceError, SimilarityScorer, TextClassifier, ZeroShotClassifier,
    ZeroShotOutcome,
};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";
/// Emotion/tone classification model.
pub const EMOTION_MODEL: &str = "SamLowe/roberta-base-go_emotions";
/// Sentence-similarity model for coherence and reference-answer comparison.
pub const SIMILARITY_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Zero-shot classification model for correctness labeling.
pub const ZERO_SHOT_MODEL: &str = "facebook/bart-large-mnli";
/// Grammatical-acceptability model (CoLA fine-tune).
pub const ACCEPTABILITY_MODEL: &str = "textattack/roberta-base-CoLA";
const MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct HfClient {
    client: Client,
    api_token: String,
    base_url: String,
}

impl HfClient {
    pub fn new(api_token: String, timeout: std::time::Duration) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_token,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Overrides the inference base URL (self-hosted endpoints, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// A `TextClassifier` bound to a specific model endpoint. The bare
    /// `HfClient` classifies with the emotion model; grammar analysis binds
    /// the acceptability model through this.
    pub fn text_classifier(&self, model: &'static str) -> ModelClassifier {
        ModelClassifier {
            client: self.clone(),
            model,
        }
    }

    /// POSTs a payload to a model endpoint, retrying 429/503 (model loading)
    /// and 5xx with exponential backoff.
    async fn post_model<T: Serialize>(&self, model: &str, payload: &T) -> Result<Value, ServiceError> {
        let url = format!("{}/{}", self.base_url, model);
        let mut last_error: Option<ServiceError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "inference call to {} failed (attempt {}), retrying after {}ms",
                    model,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(payload)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ServiceError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(ServiceError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ServiceError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let value: Value = response.json().await?;
            debug!("inference call to {} succeeded", model);
            return Ok(value);
        }

        Err(last_error.unwrap_or(ServiceError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Flattens the classification response, which arrives either as
/// `[{label, score}, ...]` or nested as `[[{label, score}, ...]]`.
fn parse_label_scores(value: Value) -> Result<Vec<LabelScore>, ServiceError> {
    let rows = match value {
        Value::Array(items) => match items.first() {
            Some(Value::Array(_)) => match items.into_iter().next() {
                Some(Value::Array(inner)) => inner,
                _ => vec![],
            },
            _ => items,
        },
        other => {
            return Err(ServiceError::Parse(serde::de::Error::custom(format!(
                "expected array of label scores, got {other}"
            ))))
        }
    };

    rows.into_iter()
        .map(|row| serde_json::from_value::<LabelScore>(row).map_err(ServiceError::Parse))
        .collect()
}

#[async_trait]
impl TextClassifier for HfClient {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError> {
        let value = self
            .post_model(EMOTION_MODEL, &json!({ "inputs": text }))
            .await?;
        parse_label_scores(value)
    }
}

/// `TextClassifier` over one fixed classification model.
#[derive(Clone)]
pub struct ModelClassifier {
    client: HfClient,
    model: &'static str,
}

#[async_trait]
impl TextClassifier for ModelClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError> {
        let value = self
            .client
            .post_model(self.model, &json!({ "inputs": text }))
            .await?;
        parse_label_scores(value)
    }
}

#[async_trait]
impl SimilarityScorer for HfClient {
    async fn similarity(
        &self,
        source: &str,
        candidates: &[String],
    ) -> Result<Vec<f64>, ServiceError> {
        let payload = json!({
            "inputs": {
                "source_sentence": source,
                "sentences": candidates,
            }
        });
        let value = self.post_model(SIMILARITY_MODEL, &payload).await?;
        serde_json::from_value::<Vec<f64>>(value).map_err(ServiceError::Parse)
    }
}

#[async_trait]
impl ZeroShotClassifier for HfClient {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<ZeroShotOutcome, ServiceError> {
        let payload = json!({
            "inputs": text,
            "parameters": { "candidate_labels": candidate_labels },
        });
        let value = self.post_model(ZERO_SHOT_MODEL, &payload).await?;
        serde_json::from_value::<ZeroShotOutcome>(value).map_err(ServiceError::Parse)
    }
}
