//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint that speaks `POST {base}/chat/completions`
//! (OpenAI, Groq, Gemini's OpenAI-compatible surface).

use crate::generation::openai_types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ErrorResponse, ResponseFormat,
};
use crate::generation::{
    classify_send_error, classify_status, GenerationError, GenerationRequest, GenerationService,
};
use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;

/// Default OpenAI API base URL
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "OpenAI-compatible API";

/// OpenAI-compatible [`GenerationService`]
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    /// Create a client for `base_url` (e.g. `https://api.groq.com/openai/v1`)
    ///
    /// # Errors
    /// * `GenerationError::Fatal` if the key is empty or not a valid header value.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        if api_key.is_empty() {
            return Err(GenerationError::Fatal("API key is empty".to_string()));
        }

        let mut headers = header::HeaderMap::new();
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| GenerationError::Fatal(format!("Invalid API key format: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Fatal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    fn build_body(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system_instruction.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(request.system_instruction.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.force_json.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GenerationService for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request);

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            force_json = request.force_json,
            prompt_len = request.prompt.len(),
            "Calling chat completions endpoint"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(PROVIDER, e))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| {
            GenerationError::Transient(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            // Prefer the structured error message when the provider sends one
            let detail = serde_json::from_str::<ErrorResponse>(&response_body)
                .map(|e| e.error.message)
                .unwrap_or(response_body);
            tracing::error!(
                status_code = status.as_u16(),
                error = %detail,
                "Chat completions endpoint returned error status"
            );
            return Err(classify_status(PROVIDER, status.as_u16(), &detail));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&response_body).map_err(|e| {
                GenerationError::Fatal(format!(
                    "Failed to parse JSON response from {}: {} - Response body: {}",
                    PROVIDER, e, response_body
                ))
            })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            GenerationError::Fatal(format!("{} response contains no choices", PROVIDER))
        })?;

        let text = choice.message.content.unwrap_or_default();

        tracing::debug!(
            response_len = text.len(),
            finish_reason = ?choice.finish_reason,
            "Received chat completion"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> OpenAiClient {
        OpenAiClient::new("test-key", &server.url(), "llama-3.1-8b-instant", 5).unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiClient::new("", OPENAI_API_BASE_URL, "gpt-4o-mini", 30);
        assert!(result.unwrap_err().to_string().contains("API key is empty"));
    }

    #[tokio::test]
    async fn test_generate_sends_system_and_user_messages() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": "Explain X"}
                ],
                "max_tokens": 512
            })))
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "X is..."}, "finish_reason": "stop"}]}"#,
            )
            .create_async()
            .await;

        let request = GenerationRequest::new("Explain X", "You are terse.").with_max_tokens(512);
        let result = client_for(&server).generate(&request).await;

        mock.assert_async().await;
        assert_eq!(result.unwrap(), "X is...");
    }

    #[tokio::test]
    async fn test_generate_null_content_becomes_empty_text() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
            .create_async()
            .await;

        let result = client_for(&server)
            .generate(&GenerationRequest::new("p", "s"))
            .await;
        assert_eq!(result.unwrap(), "");
    }

    #[tokio::test]
    async fn test_generate_json_mode_sets_response_format() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "response_format": {"type": "json_object"}
            })))
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "{}"}}]}"#)
            .create_async()
            .await;

        let request = GenerationRequest::new("p", "s").with_json_output(true);
        let _ = client_for(&server).generate(&request).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_service_unavailable_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body(r#"{"error": {"message": "overloaded"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .generate(&GenerationRequest::new("p", "s"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_generate_unauthorized_is_fatal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Invalid API key"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .generate(&GenerationRequest::new("p", "s"))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_generate_no_choices_is_fatal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .generate(&GenerationRequest::new("p", "s"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
