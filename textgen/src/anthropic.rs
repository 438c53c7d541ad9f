//! Anthropic Messages API backend.

use crate::{Error, GenerationOptions, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    ///
    /// `ANTHROPIC_MODEL` overrides the default model when set.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        let client = Self::new(api_key);
        Ok(match std::env::var("ANTHROPIC_MODEL") {
            Ok(model) if !model.trim().is_empty() => client.with_model(model),
            _ => client,
        })
    }

    /// Set the model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API base (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_api_request(&self, prompt: &str, options: &GenerationOptions) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            system: options.system_context.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for Claude {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, Error> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_api_request(prompt, options))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(REQUEST_TIMEOUT)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "Anthropic API error");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        extract_text(body)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Concatenate the text blocks of a response, ignoring anything else.
fn extract_text(response: ApiResponse) -> Result<String, Error> {
    let text = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiContent::Text { text } => Some(text),
            ApiContent::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        Err(Error::EmptyResponse)
    } else {
        Ok(text)
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Claude::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.name(), "claude");
    }

    #[test]
    fn test_client_with_model() {
        let client = Claude::new("test-key").with_model("claude-3-opus");
        assert_eq!(client.model(), "claude-3-opus");
    }

    #[test]
    fn test_request_carries_system_context() {
        let client = Claude::new("test-key");
        let options = GenerationOptions::new()
            .with_system_context("Campaign: The Ashen Crown")
            .with_max_tokens(300);

        let request = client.build_api_request("I open the door", &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["system"], "Campaign: The Ashen Crown");
        assert_eq!(json["max_tokens"], 300);
        assert_eq!(json["messages"][0]["content"], "I open the door");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_extract_text_skips_other_blocks() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "The gate creaks open."}
            ]
        }))
        .unwrap();

        assert_eq!(extract_text(response).unwrap(), "The gate creaks open.");
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let response = ApiResponse { content: vec![] };
        assert!(matches!(extract_text(response), Err(Error::EmptyResponse)));
    }
}
