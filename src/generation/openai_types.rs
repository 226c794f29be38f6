//! OpenAI-compatible chat completion types
//!
//! The same shapes are served by OpenAI, Groq and Gemini's compatibility
//! endpoint.

use serde::{Deserialize, Serialize};

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    /// Model name
    pub model: String,
    /// Conversation (system + user)
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Token limit
    pub max_tokens: u32,
    /// Output format constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// A chat message
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    /// Message text
    #[serde(default)]
    pub content: Option<String>,
}

/// `response_format` field
#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    /// "json_object" or "text"
    #[serde(rename = "type")]
    pub format_type: String,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A generated choice
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// The assistant message
    pub message: ChatMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Error envelope returned with non-success statuses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error detail
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
}
