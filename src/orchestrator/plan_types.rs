//! Plan and run data model
//!
//! A run turns a [`Goal`] into a [`Plan`], one [`StepResult`] per step, and a
//! [`FinalAnswer`]. The [`RunTrace`] captures all of it for inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The user-supplied task driving a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    /// Wrap goal text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Goal text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One atomic instruction within a plan
///
/// Steps are unique by `index` (their zero-based position), not by content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Zero-based position in the plan
    pub index: usize,
    /// Cleaned instruction text
    pub description: String,
}

/// Ordered, immutable sequence of steps
///
/// Positions are assigned on construction and the step list cannot be mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan, assigning positions in iteration order
    pub fn from_descriptions<I, S>(descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = descriptions
            .into_iter()
            .enumerate()
            .map(|(index, description)| PlanStep {
                index,
                description: description.into(),
            })
            .collect();
        Self { steps }
    }

    /// Steps in plan order
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the planner produced no usable step
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`
    pub fn get(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    /// Step descriptions in order
    pub fn descriptions(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.description.as_str()).collect()
    }
}

/// Output of executing one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step that was executed
    pub step: PlanStep,
    /// Unprocessed text returned by the executor call
    pub output: String,
    /// Wall-clock duration of the executor call
    pub elapsed_ms: u64,
}

/// Terminal artifact of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Synthesized answer text
    pub text: String,
}

/// Stage used to localize failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Producing the plan
    Planning,
    /// Executing plan steps
    Executing,
    /// Merging step results
    Synthesizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Planning => "PLANNING",
            Stage::Executing => "EXECUTING",
            Stage::Synthesizing => "SYNTHESIZING",
        };
        f.write_str(name)
    }
}

/// Orchestrator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step_index", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Created, nothing issued yet
    Init,
    /// Planner call in flight
    Planning,
    /// Executing the step at this index
    Executing(usize),
    /// Synthesizer call in flight
    Synthesizing,
    /// Final answer produced
    Done,
    /// Aborted
    Failed,
}

/// Wall-clock time spent per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Planner call(s)
    pub planning_ms: u64,
    /// All executor calls
    pub execution_ms: u64,
    /// Synthesizer call
    pub synthesis_ms: u64,
}

/// Plan plus the results accumulated so far, for success and failure alike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    /// Run identifier
    pub run_id: Uuid,
    /// Goal that started the run
    pub goal: Goal,
    /// Last lifecycle state reached
    pub state: RunState,
    /// Raw planner output, once received
    pub raw_plan: Option<String>,
    /// Parsed plan, once produced
    pub plan: Option<Plan>,
    /// Completed step results in plan order
    pub step_results: Vec<StepResult>,
    /// Synthesized answer, on success
    pub final_answer: Option<String>,
    /// Generation calls issued during the run
    pub generation_calls: usize,
    /// Per-stage durations
    #[serde(default)]
    pub timings: StageTimings,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end (success or failure)
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunTrace {
    /// Empty trace for a new run
    pub fn new(goal: Goal) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            goal,
            state: RunState::Init,
            raw_plan: None,
            plan: None,
            step_results: Vec::new(),
            final_answer: None,
            generation_calls: 0,
            timings: StageTimings::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Total run duration, once finished
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
