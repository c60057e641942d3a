use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analyzers::prosody::{PraatBackend, SimulatedBackend};
use crate::capabilities::hf::ACCEPTABILITY_MODEL;
use crate::capabilities::{HfClient, LlmClient, LocalWhisperTranscriber, OpenAiTranscriber};
use crate::pipeline::Evaluator;

/// Evaluator configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub huggingface_api_key: String,
    pub request_timeout_secs: u64,
    /// Praat executable; unset disables the signal-processing prosody backend
    /// and every prosody result is simulated.
    pub praat_command: Option<String>,
    /// Fixed seed for the simulated prosody backend. Unset seeds from entropy.
    pub prosody_seed: Option<u64>,
    /// When true, transcription shells out to a local whisper CLI instead of
    /// the hosted audio API.
    pub local_whisper: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            huggingface_api_key: require_env("HUGGINGFACE_API_KEY")?,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?,
            praat_command: std::env::var("PRAAT_COMMAND").ok(),
            prosody_seed: std::env::var("PROSODY_SEED")
                .ok()
                .map(|s| {
                    s.parse::<u64>()
                        .context("PROSODY_SEED must be a non-negative integer")
                })
                .transpose()?,
            local_whisper: std::env::var("LOCAL_WHISPER")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Wires a ready evaluator from this configuration.
    pub fn build_evaluator(&self) -> Result<Evaluator> {
        let timeout = Duration::from_secs(self.request_timeout_secs);

        let hf = Arc::new(
            HfClient::new(self.huggingface_api_key.clone(), timeout)
                .context("failed to build inference client")?,
        );
        let llm = Arc::new(
            LlmClient::new(self.openai_api_key.clone(), timeout)
                .context("failed to build completion client")?,
        );

        let acceptability = Arc::new(hf.text_classifier(ACCEPTABILITY_MODEL));
        let mut evaluator = Evaluator::new(hf.clone(), hf.clone(), hf, llm)
            .with_acceptability_classifier(acceptability);

        evaluator = if self.local_whisper {
            evaluator.with_transcriber(Arc::new(LocalWhisperTranscriber::new()))
        } else {
            evaluator.with_transcriber(Arc::new(
                OpenAiTranscriber::new(self.openai_api_key.clone(), timeout)
                    .context("failed to build transcription client")?,
            ))
        };

        if let Some(command) = &self.praat_command {
            evaluator =
                evaluator.with_prosody_backend(Arc::new(PraatBackend::new().with_command(command)));
        }
        if let Some(seed) = self.prosody_seed {
            evaluator = evaluator.with_prosody_fallback(SimulatedBackend::seeded(seed));
        }

        Ok(evaluator)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test to avoid
    // interleaving with parallel test threads.
    #[test]
    fn test_from_env_defaults_and_overrides() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("HUGGINGFACE_API_KEY", "hf-test");
        std::env::remove_var("REQUEST_TIMEOUT_SECS");
        std::env::remove_var("PRAAT_COMMAND");
        std::env::remove_var("PROSODY_SEED");
        std::env::remove_var("LOCAL_WHISPER");

        let config = Config::from_env().unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.praat_command.is_none());
        assert!(config.prosody_seed.is_none());
        assert!(!config.local_whisper);

        std::env::set_var("REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("PROSODY_SEED", "42");
        std::env::set_var("LOCAL_WHISPER", "true");
        let config = Config::from_env().unwrap();
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.prosody_seed, Some(42));
        assert!(config.local_whisper);

        std::env::set_var("PROSODY_SEED", "not-a-number");
        assert!(Config::from_env().is_err());
        std::env::remove_var("PROSODY_SEED");

        assert!(Config::from_env().and_then(|c| c.build_evaluator()).is_ok());
    }
}
