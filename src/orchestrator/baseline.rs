//! Single-call baseline
//!
//! One generation call straight from the goal, used to compare the
//! plan-execute-synthesize pipeline against the cheapest possible answer.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use crate::orchestrator::config::CallSettings;
use crate::orchestrator::plan_types::Goal;
use crate::orchestrator::prompts;
use crate::orchestrator::utils::{line_count, word_count};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Answer produced by the baseline call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineAnswer {
    /// Generated text
    pub text: String,
    /// Whitespace-separated words in `text`
    pub word_count: usize,
    /// Lines in `text`
    pub line_count: usize,
    /// Wall-clock duration of the call
    pub elapsed_ms: u64,
}

/// Answer `goal` with exactly one call
pub async fn run_baseline(
    service: &dyn GenerationService,
    goal: &Goal,
    settings: CallSettings,
) -> Result<BaselineAnswer, GenerationError> {
    let request = GenerationRequest::new(goal.as_str(), prompts::BASELINE_SYSTEM)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

    let started = Instant::now();
    let text = service.generate(&request).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        response_len = text.len(),
        elapsed_ms = elapsed_ms,
        "Baseline completed"
    );

    Ok(BaselineAnswer {
        word_count: word_count(&text),
        line_count: line_count(&text),
        text,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedService;

    #[tokio::test]
    async fn test_baseline_single_call_with_counts() {
        let service = ScriptedService::from_texts(["RAG retrieves documents.\nThen it generates."]);
        let answer = run_baseline(&service, &Goal::new("Explain RAG"), CallSettings::new(0.3, 1024))
            .await
            .unwrap();

        assert_eq!(answer.word_count, 6);
        assert_eq!(answer.line_count, 2);

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Explain RAG");
        assert_eq!(requests[0].system_instruction, prompts::BASELINE_SYSTEM);
        assert_eq!(requests[0].temperature, 0.3);
    }

    #[tokio::test]
    async fn test_baseline_line_count_with_trailing_newline() {
        let service = ScriptedService::from_texts(["First line.\nSecond line.\n"]);
        let answer = run_baseline(&service, &Goal::new("g"), CallSettings::new(0.3, 1024))
            .await
            .unwrap();
        assert_eq!(answer.line_count, 3);

        let empty = ScriptedService::from_texts([""]);
        let answer = run_baseline(&empty, &Goal::new("g"), CallSettings::new(0.3, 1024))
            .await
            .unwrap();
        assert_eq!(answer.word_count, 0);
        assert_eq!(answer.line_count, 1);
    }

    #[tokio::test]
    async fn test_baseline_propagates_failure() {
        let service = ScriptedService::new([Err(GenerationError::Transient("timeout".to_string()))]);
        let err = run_baseline(&service, &Goal::new("g"), CallSettings::new(0.3, 1024))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
