//! Text generation backends for the campaign engine.
//!
//! This crate provides:
//! - A `TextGenerator` trait that every backend implements
//! - An Anthropic Messages API backend (`Claude`)
//! - An OpenAI-compatible chat backend (`OpenAiCompatible`, e.g. Ollama)
//! - `FailoverClient`, which walks a prioritized list of backends with
//!   per-attempt timeouts and bounded retries

mod anthropic;
mod failover;
mod openai;

pub use anthropic::Claude;
pub use failover::{FailoverClient, RetryConfig};
pub use openai::OpenAiCompatible;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when generating text.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend returned no text")]
    EmptyResponse,

    #[error("No generation backends configured")]
    NoBackends,

    #[error("All generation backends failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

impl Error {
    /// Whether retrying the same backend could plausibly succeed.
    ///
    /// Auth failures and malformed requests will fail again; network
    /// trouble, timeouts, rate limits and server errors may not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) | Error::EmptyResponse | Error::Parse(_) => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::NoApiKey
            | Error::Config(_)
            | Error::NoBackends
            | Error::Exhausted(_) => false,
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    /// System-level context sent alongside the prompt.
    pub system_context: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: 1024,
            system_context: None,
        }
    }
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_context(mut self, context: impl Into<String>) -> Self {
        self.system_context = Some(context.into());
        self
    }
}

/// A backend that turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a single prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, Error>;

    /// Short backend name used in logs and error reports.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = GenerationOptions::new()
            .with_temperature(0.7)
            .with_max_tokens(500)
            .with_system_context("You are a narrator");

        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.max_tokens, 500);
        assert_eq!(options.system_context.as_deref(), Some("You are a narrator"));
    }

    #[test]
    fn test_temperature_clamped() {
        let options = GenerationOptions::new().with_temperature(3.0);
        assert_eq!(options.temperature, Some(1.0));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Network("reset".into()).is_retryable());
        assert!(Error::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(Error::Api { status: 503, message: String::new() }.is_retryable());
        assert!(Error::Api { status: 429, message: String::new() }.is_retryable());
        assert!(!Error::Api { status: 401, message: String::new() }.is_retryable());
        assert!(!Error::NoApiKey.is_retryable());
    }

    #[test]
    fn test_exhausted_message_lists_failures() {
        let err = Error::Exhausted(vec!["claude: timeout".into(), "ollama: refused".into()]);
        let message = err.to_string();
        assert!(message.contains("claude: timeout"));
        assert!(message.contains("ollama: refused"));
    }
}
