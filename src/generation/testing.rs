//! Scripted generation service
//!
//! A deterministic stand-in for a real provider. It either replays a queue of
//! canned results in call order or answers through a responder closure, and
//! records every request it receives.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<String, GenerationError>>>),
    Responder(Responder),
}

/// Test double for [`GenerationService`]
pub struct ScriptedService {
    script: Script,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    /// Replay `responses` in order. Calls past the end fail with `Fatal`.
    pub fn new(responses: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(responses.into_iter().collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replay successful `texts` in order
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// Answer every call through `responder`; useful when call order is not fixed
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls received so far
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Snapshot of every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front()
                .unwrap_or_else(|| {
                    Err(GenerationError::Fatal(
                        "scripted responses exhausted".to_string(),
                    ))
                }),
            Script::Responder(responder) => responder(request),
        }
    }
}
