//! Synthesizer
//!
//! Merges the ordered step results into one answer with a single call.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use crate::orchestrator::config::{CallSettings, OrchestratorConfig};
use crate::orchestrator::plan_types::{FinalAnswer, Goal, StepResult};
use crate::orchestrator::prompts;

/// Render every step and its result, in plan order, untruncated.
///
/// Each block reads `Step <n>: <description>\nResult: <output>` with `n`
/// one-based; blocks are separated by a blank line. No results renders as an
/// empty string.
pub fn render_context(step_results: &[StepResult]) -> String {
    step_results
        .iter()
        .map(|result| {
            format!(
                "Step {}: {}\nResult: {}",
                result.step.index + 1,
                result.step.description,
                result.output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Synthesis stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synthesizer {
    settings: CallSettings,
    min_words: u32,
    max_words: u32,
}

impl Synthesizer {
    /// Synthesizer targeting `min_words`-`max_words`
    pub fn new(settings: CallSettings, min_words: u32, max_words: u32) -> Self {
        Self {
            settings,
            min_words,
            max_words,
        }
    }

    /// Synthesizer configured from `config`
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            config.synthesizer,
            config.synthesis_min_words,
            config.synthesis_max_words,
        )
    }

    /// Merge `step_results` into a final answer with exactly one call
    pub async fn synthesize(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
        step_results: &[StepResult],
    ) -> Result<FinalAnswer, GenerationError> {
        let context = render_context(step_results);

        tracing::debug!(
            num_steps = step_results.len(),
            prompt_len = context.len(),
            "Synthesizing final answer"
        );

        let request = GenerationRequest::new(
            prompts::synthesizer_prompt(goal.as_str(), &context),
            prompts::synthesizer_system(self.min_words, self.max_words),
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let text = service.generate(&request).await?;
        Ok(FinalAnswer { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedService;
    use crate::orchestrator::plan_types::Plan;

    fn results_for(plan: &Plan, outputs: &[&str]) -> Vec<StepResult> {
        plan.steps()
            .iter()
            .zip(outputs)
            .map(|(step, output)| StepResult {
                step: step.clone(),
                output: output.to_string(),
                elapsed_ms: 0,
            })
            .collect()
    }

    #[test]
    fn test_render_context_format() {
        let plan = Plan::from_descriptions(["Explain X", "Compare Y"]);
        let context = render_context(&results_for(&plan, &["x out", "y out"]));
        assert_eq!(
            context,
            "Step 1: Explain X\nResult: x out\n\nStep 2: Compare Y\nResult: y out"
        );
    }

    #[test]
    fn test_render_context_includes_everything_once_in_order() {
        let long_output = "word ".repeat(5000);
        let plan = Plan::from_descriptions(["Alpha step", "Beta step", "Gamma step"]);
        let results = results_for(&plan, &["alpha-result", &long_output, "gamma-result"]);
        let context = render_context(&results);

        let mut last = 0;
        for result in &results {
            assert_eq!(context.matches(result.step.description.as_str()).count(), 1);
            let pos = context.find(result.step.description.as_str()).unwrap();
            assert!(pos >= last);
            last = pos;
        }
        assert_eq!(context.matches("alpha-result").count(), 1);
        assert!(context.contains(long_output.as_str()));
    }

    #[test]
    fn test_render_context_empty() {
        assert_eq!(render_context(&[]), "");
    }

    #[tokio::test]
    async fn test_synthesize_issues_one_call() {
        let service = ScriptedService::from_texts(["final"]);
        let synthesizer = Synthesizer::from_config(&OrchestratorConfig::default());
        let plan = Plan::from_descriptions(["Explain X"]);

        let answer = synthesizer
            .synthesize(&service, &Goal::new("goal"), &results_for(&plan, &["x out"]))
            .await
            .unwrap();

        assert_eq!(answer.text, "final");
        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Step 1: Explain X\nResult: x out"));
        assert!(requests[0].system_instruction.contains("400-600 words"));
        assert_eq!(requests[0].max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_synthesize_zero_results() {
        let service = ScriptedService::from_texts(["nothing to merge"]);
        let synthesizer = Synthesizer::new(CallSettings::new(0.2, 1024), 100, 200);

        let answer = synthesizer
            .synthesize(&service, &Goal::new("goal"), &[])
            .await
            .unwrap();
        assert_eq!(answer.text, "nothing to merge");
        assert!(service.requests()[0].system_instruction.contains("100-200 words"));
    }
}
