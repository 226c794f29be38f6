//! Text generation capability
//!
//! The orchestrator consumes exactly one external operation: turn a prompt and a
//! role instruction into text. Everything provider-specific (endpoints, auth,
//! wire formats, retries) lives behind the [`GenerationService`] trait so the
//! core can be driven by a scripted substitute in tests.

pub mod gemini;
pub mod gemini_types;
pub mod openai;
pub mod openai_types;
pub mod provider;
pub mod retry;
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single text-completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// User-turn prompt
    pub prompt: String,
    /// Role instruction (system prompt)
    pub system_instruction: String,
    /// Sampling temperature in `[0, 1]`
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Ask the provider for a JSON document instead of free text
    #[serde(default)]
    pub force_json: bool,
}

impl GenerationRequest {
    /// Create a request with the default sampling settings (0.2 / 1024)
    pub fn new(prompt: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: system_instruction.into(),
            temperature: 0.2,
            max_tokens: 1024,
            force_json: false,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request JSON output
    pub fn with_json_output(mut self, force_json: bool) -> Self {
        self.force_json = force_json;
        self
    }
}

/// Failures reported by a generation provider
///
/// `Transient` failures (network errors, rate limits, gateway errors) are safe
/// to retry outside the orchestrator. `Fatal` failures (bad credentials,
/// invalid requests, malformed responses) are not.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum GenerationError {
    /// Recoverable failure
    #[error("Transient generation failure: {0}")]
    Transient(String),

    /// Non-retryable failure
    #[error("Fatal generation failure: {0}")]
    Fatal(String),
}

impl GenerationError {
    /// Whether a retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }

}

/// Synchronous-from-the-caller text completion
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate text for a single request
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Classify a reqwest transport error.
///
/// Timeouts and connection failures are transient; anything else (bad URL,
/// body encoding) will fail the same way on the next attempt. The request URL
/// is stripped so it never reaches callers or logs.
pub(crate) fn classify_send_error(provider: &str, err: reqwest::Error) -> GenerationError {
    let err = err.without_url();
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Transient(format!("Failed to reach {}: {}", provider, err))
    } else {
        GenerationError::Fatal(format!("Failed to send request to {}: {}", provider, err))
    }
}

/// Classify a non-success HTTP status returned by a provider
pub(crate) fn classify_status(provider: &str, status_code: u16, body: &str) -> GenerationError {
    match status_code {
        429 => GenerationError::Transient(format!(
            "{} rate limit exceeded (HTTP {}): {}",
            provider, status_code, body
        )),
        408 | 500 | 502 | 503 | 504 => GenerationError::Transient(format!(
            "{} temporarily unavailable (HTTP {}): {}",
            provider, status_code, body
        )),
        _ => GenerationError::Fatal(format!(
            "{} returned error status {}: {}",
            provider, status_code, body
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("prompt", "system")
            .with_temperature(0.3)
            .with_max_tokens(512)
            .with_json_output(true);

        assert_eq!(request.prompt, "prompt");
        assert_eq!(request.system_instruction, "system");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 512);
        assert!(request.force_json);
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status("Gemini API", 429, "slow down").is_transient());
        assert!(classify_status("Gemini API", 503, "").is_transient());
        assert!(classify_status("Gemini API", 504, "").is_transient());
        assert!(!classify_status("Gemini API", 400, "bad request").is_transient());
        assert!(!classify_status("Gemini API", 401, "bad key").is_transient());
        assert!(!classify_status("Gemini API", 403, "quota").is_transient());
    }

    #[test]
    fn test_error_message_and_serialization() {
        let err = GenerationError::Fatal("quota exhausted".to_string());
        assert!(err.to_string().contains("Fatal"));

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "fatal");
        assert_eq!(json["message"], "quota exhausted");
    }
}
