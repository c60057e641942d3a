//! Speech-to-text capability: hosted Whisper over HTTP as the primary engine,
//! a local `whisper` CLI invocation as the fallback when no API key is
//! configured. Both write scratch files scoped to the call.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ServiceError, Transcriber};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TRANSCRIPTION_TEMPERATURE: &str = "0.2";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Hosted Whisper transcription via the OpenAI audio API.
#[derive(Clone)]
pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: String, timeout: std::time::Duration) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, ServiceError> {
        let part = Part::bytes(audio.to_vec())
            .file_name("answer.wav")
            .mime_str("audio/wav")
            .map_err(ServiceError::Http)?;
        let form = Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", language.to_string())
            .text("response_format", "json")
            .text("temperature", TRANSCRIPTION_TEMPERATURE);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        debug!("transcription succeeded: {} chars", body.text.len());
        if body.text.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }
        Ok(body.text)
    }
}

/// Local Whisper CLI fallback, selected when the hosted engine is
/// unconfigured. Audio is written to a scratch directory that is removed when
/// the call finishes, on success and error paths alike.
pub struct LocalWhisperTranscriber {
    command: String,
    model_size: String,
}

impl LocalWhisperTranscriber {
    pub fn new() -> Self {
        Self {
            command: "whisper".to_string(),
            model_size: "base".to_string(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Default for LocalWhisperTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for LocalWhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, ServiceError> {
        let dir = tempfile::tempdir()?;
        let audio_path = dir.path().join("answer.wav");
        tokio::fs::write(&audio_path, audio).await?;

        let output = tokio::process::Command::new(&self.command)
            .arg(&audio_path)
            .args(["--model", &self.model_size])
            .args(["--language", language])
            .args(["--output_format", "txt"])
            .arg("--output_dir")
            .arg(dir.path())
            .output()
            .await
            .map_err(|e| ServiceError::Subprocess(format!("whisper invocation failed: {e}")))?;

        if !output.status.success() {
            warn!(
                "local whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(ServiceError::Subprocess(format!(
                "whisper exited with {}",
                output.status
            )));
        }

        let transcript_path = dir.path().join("answer.txt");
        let text = tokio::fs::read_to_string(&transcript_path).await?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::EmptyContent);
        }
        Ok(text)
    }
}
