//! Upstream text generation.
//!
//! [`Generator`] is the seam between the request handlers and whatever produces
//! the answer for a prompt. [`OpenAiClient`] implements it against an
//! OpenAI-compatible `chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

/// Default API base, without a trailing slash.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Failures talking to the upstream API.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Produces a text response for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, text: &str) -> Result<String, LlmError>;
}

/// Connection settings for [`OpenAiClient`].
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Builds a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the TLS backend cannot be initialized.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, text: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": text }],
        });

        debug!(model = %self.config.model, prompt_chars = text.chars().count(), "calling upstream");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let message = api_error_message(&raw);
            warn!(status = status.as_u16(), error = %message, "upstream returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = serde_json::from_str(&raw)?;
        Ok(format_response(&value))
    }
}

// Pulls `error.message` out of an error body, falling back to the raw text.
fn api_error_message(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| raw.trim().to_owned())
}

/// Reduces an upstream payload to the text shown to the caller.
///
/// A JSON string is returned as-is. A completion object yields
/// `choices[0].message.content`, or `choices[0].text` for the legacy
/// completions shape. Anything else is pretty-printed.
///
/// # Examples
///
/// ```
/// use promptcache::llm::format_response;
/// use serde_json::json;
///
/// let body = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
/// assert_eq!(format_response(&body), "hi");
/// assert_eq!(format_response(&json!("plain")), "plain");
/// ```
pub fn format_response(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_owned();
    }

    let choice = &value["choices"][0];
    if let Some(content) = choice["message"]["content"].as_str() {
        return content.to_owned();
    }
    if let Some(text) = choice["text"].as_str() {
        return text.to_owned();
    }

    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_completion_content() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hello!" } }]
        });
        assert_eq!(format_response(&body), "Hello!");
    }

    #[test]
    fn legacy_completion_text() {
        let body = json!({ "choices": [{ "text": "legacy" }] });
        assert_eq!(format_response(&body), "legacy");
    }

    #[test]
    fn unknown_shape_is_pretty_printed() {
        let body = json!({ "result": 1 });
        assert_eq!(format_response(&body), "{\n  \"result\": 1\n}");
    }

    #[test]
    fn empty_choices_fall_back_to_json() {
        let body = json!({ "choices": [] });
        assert!(format_response(&body).contains("\"choices\""));
    }

    #[test]
    fn error_message_extraction() {
        let raw = serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })
        .to_string();
        assert_eq!(api_error_message(&raw), "Incorrect API key provided");
        assert_eq!(api_error_message("  upstream down \n"), "upstream down");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = "http://localhost:9999/v1/".to_string();
        let client = OpenAiClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", OpenAiConfig::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
