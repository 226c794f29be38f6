//! Orchestrator module
//!
//! The plan-execute-synthesize core: a planner turns the goal into an ordered
//! plan, an executor resolves each step in isolation, and a synthesizer merges
//! the step results. [`runner::Orchestrator`] sequences the three and owns the
//! run's state and failure reporting.

pub mod baseline;
pub mod config;
pub mod events;
pub mod executor;
pub mod plan_parser;
pub mod plan_types;
pub mod planner;
pub mod prompts;
pub mod runner;
pub mod synthesizer;
pub mod trace_store;
pub mod utils;

pub use config::OrchestratorConfig;
pub use plan_types::{FinalAnswer, Goal, Plan, PlanStep, RunState, RunTrace, Stage, StepResult};
pub use runner::{trace_of, FailureCause, Orchestrator, RunFailure, RunOutcome};
