//! Provider selection
//!
//! Turns an explicit [`ProviderConfig`] into a ready-to-use service. Detection
//! works over a caller-supplied lookup so nothing here reads process state.

use crate::generation::gemini::{GeminiClient, GEMINI_API_BASE_URL};
use crate::generation::openai::{OpenAiClient, OPENAI_API_BASE_URL};
use crate::generation::retry::{RetryPolicy, RetryingService};
use crate::generation::{GenerationError, GenerationService};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Wire protocol spoken by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Native Gemini `generateContent`
    Gemini,
    /// OpenAI-style `chat/completions`
    OpenAiCompatible,
}

/// Everything needed to construct a generation service
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    /// Wire protocol
    pub kind: ProviderKind,
    /// Credential
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Base URL of the API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

// Keep the key out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// No credential found during detection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "No LLM API key found. Set one of: GOOGLE_API_KEY (Gemini), GROQ_API_KEY (Groq), OPENAI_API_KEY (OpenAI)"
)]
pub struct MissingApiKey;

/// (key variable, kind, base url, default model), in priority order
const KNOWN_PROVIDERS: [(&str, ProviderKind, &str, &str); 3] = [
    (
        "GOOGLE_API_KEY",
        ProviderKind::Gemini,
        GEMINI_API_BASE_URL,
        "gemini-2.0-flash",
    ),
    (
        "GROQ_API_KEY",
        ProviderKind::OpenAiCompatible,
        "https://api.groq.com/openai/v1",
        "llama-3.1-8b-instant",
    ),
    (
        "OPENAI_API_KEY",
        ProviderKind::OpenAiCompatible,
        OPENAI_API_BASE_URL,
        "gpt-4o-mini",
    ),
];

impl ProviderConfig {
    /// Pick the first provider whose key `lookup` returns
    ///
    /// `OPENAI_API_BASE` overrides the base URL and switches to the
    /// OpenAI-compatible protocol; `LLM_MODEL` overrides the model.
    pub fn detect<F>(lookup: F, timeout_secs: u64) -> Result<Self, MissingApiKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let (api_key, mut kind, default_base, default_model) = KNOWN_PROVIDERS
            .iter()
            .find_map(|(var, kind, base, model)| {
                non_empty(var).map(|key| (key, *kind, *base, *model))
            })
            .ok_or(MissingApiKey)?;

        let base_url = match non_empty("OPENAI_API_BASE") {
            Some(base) => {
                kind = ProviderKind::OpenAiCompatible;
                base
            }
            None => default_base.to_string(),
        };

        Ok(Self {
            kind,
            api_key,
            base_url,
            model: non_empty("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            timeout_secs,
        })
    }
}

/// Build a service for `config`, wrapped in retries when `policy.max_retries > 0`
pub fn build_service(
    config: &ProviderConfig,
    policy: RetryPolicy,
) -> Result<Arc<dyn GenerationService>, GenerationError> {
    let base: Arc<dyn GenerationService> = match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::with_base_url(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.timeout_secs,
        )?),
        ProviderKind::OpenAiCompatible => Arc::new(OpenAiClient::new(
            &config.api_key,
            &config.base_url,
            config.model.clone(),
            config.timeout_secs,
        )?),
    };

    tracing::info!(
        kind = ?config.kind,
        model = %config.model,
        base_url = %config.base_url,
        max_retries = policy.max_retries,
        "Generation service configured"
    );

    if policy.max_retries == 0 {
        Ok(base)
    } else {
        Ok(Arc::new(RetryingService::new(base, policy)))
    }
}
