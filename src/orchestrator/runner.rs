//! Orchestrator state machine
//!
//! Drives `INIT -> PLANNING -> EXECUTING(i) -> SYNTHESIZING -> DONE`, with
//! `FAILED` reachable from any stage. The orchestrator owns the run trace for
//! the whole run and never retries: the first generation failure ends the run
//! and is reported with its stage, the failing step (if any) and everything
//! completed up to that point.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use crate::orchestrator::config::{EmptyPlanPolicy, ExecutionMode, OrchestratorConfig};
use crate::orchestrator::events::{EventSender, EventSink, RunEvent};
use crate::orchestrator::executor::{Executor, StepError};
use crate::orchestrator::plan_parser::PlanParseError;
use crate::orchestrator::plan_types::{FinalAnswer, Goal, RunState, RunTrace, Stage};
use crate::orchestrator::planner::Planner;
use crate::orchestrator::synthesizer::Synthesizer;
use crate::orchestrator::utils::{hash_goal, hash_plan};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::Instrument;

/// Why a run failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "error", rename_all = "snake_case")]
pub enum FailureCause {
    /// A generation call failed
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// The planner produced no usable step and the policy forbids an empty plan
    #[error("Parse ambiguity: {0}")]
    ParseAmbiguity(#[from] PlanParseError),
}

/// A run that did not reach `DONE`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    /// Stage that failed
    pub stage: Stage,
    /// Failing step, for `EXECUTING` failures
    pub step_index: Option<usize>,
    /// Underlying failure
    pub cause: FailureCause,
    /// Every failing step slot (concurrent execution may report several)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub step_errors: Vec<StepError>,
    /// Plan and step results completed before the failure
    pub partial_trace: RunTrace,
}

impl RunFailure {
    /// Whether the failing call could succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(&self.cause, FailureCause::Generation(e) if e.is_transient())
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_index {
            Some(index) => write!(f, "Run failed at {}({}): {}", self.stage, index, self.cause),
            None => write!(f, "Run failed at {}: {}", self.stage, self.cause),
        }
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// A run that reached `DONE`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Synthesized answer
    pub answer: FinalAnswer,
    /// Full plan and step results
    pub trace: RunTrace,
}

/// Trace of any finished run, successful or not
pub fn trace_of(result: &Result<RunOutcome, RunFailure>) -> &RunTrace {
    match result {
        Ok(outcome) => &outcome.trace,
        Err(failure) => &failure.partial_trace,
    }
}

/// Counts calls forwarded to the wrapped service
pub struct CountingService {
    inner: Arc<dyn GenerationService>,
    calls: AtomicUsize,
}

impl CountingService {
    /// Wrap `inner` with a zeroed counter
    pub fn new(inner: Arc<dyn GenerationService>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls issued so far, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for CountingService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate(request).await
    }
}

/// Stage-local failure, before the trace is attached
struct StageFailure {
    stage: Stage,
    step_index: Option<usize>,
    cause: FailureCause,
    step_errors: Vec<StepError>,
}

impl StageFailure {
    fn generation(stage: Stage, step_index: Option<usize>, error: GenerationError) -> Self {
        Self {
            stage,
            step_index,
            cause: FailureCause::Generation(error),
            step_errors: Vec::new(),
        }
    }
}

/// Plan-execute-synthesize orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn GenerationService>,
    config: OrchestratorConfig,
    events: EventSink,
}

impl Orchestrator {
    /// Orchestrator over `service`
    pub fn new(service: Arc<dyn GenerationService>, config: OrchestratorConfig) -> Self {
        Self {
            service,
            config,
            events: EventSink::none(),
        }
    }

    /// Report progress to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the full pipeline for `goal`
    pub async fn run(&self, goal: impl Into<String>) -> Result<RunOutcome, RunFailure> {
        self.run_goal(Goal::new(goal)).await
    }

    /// Run the full pipeline for an already-wrapped goal
    pub async fn run_goal(&self, goal: Goal) -> Result<RunOutcome, RunFailure> {
        let mut trace = RunTrace::new(goal);
        let span = tracing::info_span!(
            "run",
            run_id = %trace.run_id,
            goal_hash = %hash_goal(trace.goal.as_str()),
        );

        async move {
            let counter = CountingService::new(self.service.clone());
            tracing::info!(
                goal_len = trace.goal.as_str().len(),
                execution_mode = ?self.config.execution_mode,
                "Starting run"
            );

            let result = self.drive(&counter, &mut trace).await;

            trace.generation_calls = counter.calls();
            trace.finished_at = Some(Utc::now());

            match result {
                Ok(answer) => {
                    trace.state = RunState::Done;
                    trace.final_answer = Some(answer.text.clone());
                    tracing::info!(
                        generation_calls = trace.generation_calls,
                        elapsed_ms = trace.elapsed_ms().unwrap_or_default(),
                        "Run completed"
                    );
                    self.events.emit(RunEvent::Completed {
                        run_id: trace.run_id,
                        answer: answer.text.clone(),
                        generation_calls: trace.generation_calls,
                    });
                    Ok(RunOutcome { answer, trace })
                }
                Err(failure) => {
                    trace.state = RunState::Failed;
                    tracing::error!(
                        stage = %failure.stage,
                        step_index = ?failure.step_index,
                        completed_steps = trace.step_results.len(),
                        generation_calls = trace.generation_calls,
                        error = %failure.cause,
                        "Run failed"
                    );
                    self.events.emit(RunEvent::Failed {
                        run_id: trace.run_id,
                        stage: failure.stage,
                        step_index: failure.step_index,
                        error: failure.cause.to_string(),
                    });
                    Err(RunFailure {
                        stage: failure.stage,
                        step_index: failure.step_index,
                        cause: failure.cause,
                        step_errors: failure.step_errors,
                        partial_trace: trace,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        service: &dyn GenerationService,
        trace: &mut RunTrace,
    ) -> Result<FinalAnswer, StageFailure> {
        // PLANNING
        trace.state = RunState::Planning;
        self.events.emit(RunEvent::PlanningStarted {
            run_id: trace.run_id,
        });

        let started = Instant::now();
        let planned = Planner::from_config(&self.config)
            .plan(service, &trace.goal)
            .await;
        trace.timings.planning_ms = elapsed_ms(started);
        let output = planned.map_err(|e| StageFailure::generation(Stage::Planning, None, e))?;

        let plan = output.plan;
        trace.raw_plan = Some(output.raw);
        trace.plan = Some(plan.clone());

        tracing::info!(
            num_steps = plan.len(),
            plan_hash = %hash_plan(&plan),
            "Plan ready"
        );
        self.events.emit(RunEvent::PlanReady {
            run_id: trace.run_id,
            plan: plan.clone(),
        });

        if let Some(ambiguity) = output.ambiguity {
            match self.config.empty_plan_policy {
                EmptyPlanPolicy::Synthesize => {
                    tracing::warn!(
                        error = %ambiguity,
                        "Planner produced no steps, synthesizing from zero results"
                    );
                }
                EmptyPlanPolicy::Fail => {
                    return Err(StageFailure {
                        stage: Stage::Planning,
                        step_index: None,
                        cause: FailureCause::ParseAmbiguity(ambiguity),
                        step_errors: Vec::new(),
                    });
                }
            }
        }

        // EXECUTING
        let executor = Executor::from_config(&self.config);
        let started = Instant::now();
        let executed = match self.config.execution_mode {
            ExecutionMode::Sequential => {
                let mut outcome = Ok(());
                for step in plan.steps() {
                    trace.state = RunState::Executing(step.index);
                    let result = executor
                        .execute_observed(service, &trace.goal, step, &self.events)
                        .await;
                    match result {
                        Ok(result) => trace.step_results.push(result),
                        Err(e) => {
                            outcome = Err(StageFailure::generation(
                                Stage::Executing,
                                Some(step.index),
                                e,
                            ));
                            break;
                        }
                    }
                }
                outcome
            }
            ExecutionMode::Concurrent if plan.is_empty() => Ok(()),
            ExecutionMode::Concurrent => {
                trace.state = RunState::Executing(0);
                let aggregated = executor
                    .execute_concurrent(
                        service,
                        &trace.goal,
                        &plan,
                        self.config.max_parallel_steps,
                        &self.events,
                    )
                    .await;
                match aggregated {
                    Ok(results) => {
                        trace.step_results = results;
                        Ok(())
                    }
                    Err(failure) => {
                        trace.state = RunState::Executing(failure.step_index);
                        trace.step_results = failure.completed;
                        Err(StageFailure {
                            stage: Stage::Executing,
                            step_index: Some(failure.step_index),
                            cause: FailureCause::Generation(failure.error),
                            step_errors: failure.step_errors,
                        })
                    }
                }
            }
        };
        trace.timings.execution_ms = elapsed_ms(started);
        executed?;

        // SYNTHESIZING
        trace.state = RunState::Synthesizing;
        self.events.emit(RunEvent::SynthesisStarted {
            step_count: trace.step_results.len(),
        });

        let started = Instant::now();
        let synthesized = Synthesizer::from_config(&self.config)
            .synthesize(service, &trace.goal, &trace.step_results)
            .await;
        trace.timings.synthesis_ms = elapsed_ms(started);
        synthesized.map_err(|e| StageFailure::generation(Stage::Synthesizing, None, e))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
