//! Step executor
//!
//! One generation call per plan step. A step never sees another step's
//! output, so steps can run in any order or concurrently without changing
//! their individual results.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use crate::orchestrator::config::{CallSettings, OrchestratorConfig};
use crate::orchestrator::events::{EventSink, RunEvent};
use crate::orchestrator::plan_types::{Goal, Plan, PlanStep, StepResult};
use crate::orchestrator::prompts;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Failure of one step slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    /// Failing step position
    pub step_index: usize,
    /// Generation failure
    pub error: GenerationError,
}

/// Aggregated failure of an execution pass
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFailure {
    /// Lowest failing step position
    pub step_index: usize,
    /// Failure at `step_index`
    pub error: GenerationError,
    /// Results of the steps before `step_index`, in plan order
    pub completed: Vec<StepResult>,
    /// Every failing slot, in plan order
    pub step_errors: Vec<StepError>,
}

/// Execution stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Executor {
    settings: CallSettings,
}

impl Executor {
    /// Executor with explicit call settings
    pub fn new(settings: CallSettings) -> Self {
        Self { settings }
    }

    /// Executor configured from `config`
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.executor)
    }

    /// Execute one step with exactly one generation call.
    ///
    /// The output is returned unprocessed.
    pub async fn execute_step(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
        step: &PlanStep,
    ) -> Result<StepResult, GenerationError> {
        let request = GenerationRequest::new(
            prompts::executor_prompt(goal.as_str(), &step.description),
            prompts::EXECUTOR_SYSTEM,
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let started = Instant::now();
        let output = service.generate(&request).await?;

        Ok(StepResult {
            step: step.clone(),
            output,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// [`Executor::execute_step`] with logging and progress events
    pub async fn execute_observed(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
        step: &PlanStep,
        events: &EventSink,
    ) -> Result<StepResult, GenerationError> {
        events.emit(RunEvent::StepStarted {
            step_index: step.index,
            description: step.description.clone(),
        });
        tracing::debug!(step_index = step.index, "Executing step");

        match self.execute_step(service, goal, step).await {
            Ok(result) => {
                tracing::info!(
                    step_index = step.index,
                    response_len = result.output.len(),
                    elapsed_ms = result.elapsed_ms,
                    "Step completed"
                );
                events.emit(RunEvent::StepCompleted {
                    step_index: step.index,
                    output: result.output.clone(),
                    elapsed_ms: result.elapsed_ms,
                });
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    step_index = step.index,
                    transient = e.is_transient(),
                    error = %e,
                    "Step failed"
                );
                events.emit(RunEvent::StepFailed {
                    step_index: step.index,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Execute every step with at most `max_parallel` calls in flight.
    ///
    /// Each step gets its own result-or-error slot and every slot resolves
    /// before aggregation. On failure the lowest failing position is reported,
    /// together with the successful results that precede it.
    pub async fn execute_concurrent(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
        plan: &Plan,
        max_parallel: usize,
        events: &EventSink,
    ) -> Result<Vec<StepResult>, ExecutionFailure> {
        tracing::debug!(
            num_steps = plan.len(),
            max_parallel = max_parallel,
            "Executing steps concurrently"
        );

        // collected first so the spawned run future carries no closure type
        let pending: Vec<_> = plan
            .steps()
            .iter()
            .map(|step| self.execute_observed(service, goal, step, events))
            .collect();

        let slots: Vec<Result<StepResult, GenerationError>> = stream::iter(pending)
            .buffered(max_parallel.max(1))
            .collect()
            .await;

        aggregate_slots(slots)
    }
}

/// Fold per-step slots (in plan order) into results or a failure
pub fn aggregate_slots(
    slots: Vec<Result<StepResult, GenerationError>>,
) -> Result<Vec<StepResult>, ExecutionFailure> {
    let mut results = Vec::with_capacity(slots.len());
    let mut step_errors = Vec::new();

    for (step_index, slot) in slots.into_iter().enumerate() {
        match slot {
            Ok(result) => results.push(result),
            Err(error) => step_errors.push(StepError { step_index, error }),
        }
    }

    let Some(first) = step_errors.first().cloned() else {
        return Ok(results);
    };

    // keep only the contiguous prefix before the first failure
    results.retain(|r| r.step.index < first.step_index);

    Err(ExecutionFailure {
        step_index: first.step_index,
        error: first.error,
        completed: results,
        step_errors,
    })
}
