//! Gemini API client
//!
//! Direct HTTP client for the Gemini `generateContent` endpoint.

use crate::generation::gemini_types::{
    GeminiApiRequest, GeminiApiResponse, GenerationConfig, RequestContent, RequestPart,
    SystemInstruction,
};
use crate::generation::{
    classify_send_error, classify_status, GenerationError, GenerationRequest, GenerationService,
};
use async_trait::async_trait;
use std::time::Duration;

/// Default Gemini API base URL
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "Gemini API";

/// Gemini-backed [`GenerationService`]
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client against the public Gemini endpoint
    ///
    /// # Errors
    /// * Returns `GenerationError::Fatal` if the API key is empty or the HTTP
    ///   client cannot be constructed.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        Self::with_base_url(api_key, model, GEMINI_API_BASE_URL, timeout_secs)
    }

    /// Create a client against a custom base URL (proxies, tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GenerationError::Fatal("API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Fatal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn build_body(request: &GenerationRequest) -> GeminiApiRequest {
        let system_instruction = if request.system_instruction.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: vec![RequestPart {
                    text: request.system_instruction.clone(),
                }],
            })
        };

        GeminiApiRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request
                    .force_json
                    .then(|| "application/json".to_string()),
            },
        }
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = Self::build_body(request);

        tracing::debug!(
            url = %url,
            model = %self.model,
            force_json = request.force_json,
            prompt_len = request.prompt.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status.as_u16(),
                error_body = %error_body,
                "Gemini API returned error status"
            );

            return Err(classify_status(PROVIDER, status.as_u16(), &error_body));
        }

        let response_body = response.text().await.map_err(|e| {
            GenerationError::Transient(format!(
                "Failed to read response body from Gemini API: {}",
                e
            ))
        })?;

        let parsed: GeminiApiResponse = serde_json::from_str(&response_body).map_err(|e| {
            GenerationError::Fatal(format!(
                "Failed to parse JSON response from Gemini API: {} - Response body: {}",
                e, response_body
            ))
        })?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_ref())
        {
            return Err(GenerationError::Fatal(format!(
                "Gemini API blocked the prompt: {}",
                reason
            )));
        }

        let candidate = parsed.candidates.first().ok_or_else(|| {
            GenerationError::Fatal("Gemini API response contains no candidates".to_string())
        })?;

        let text: String = candidate
            .content
            .as_ref()
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        tracing::debug!(
            response_len = text.len(),
            finish_reason = ?candidate.finish_reason,
            "Received response from Gemini API"
        );

        Ok(text)
    }
}
