//! Orchestrator configuration
//!
//! Centralized settings for the planner, executor and synthesizer calls and
//! for the run policy (execution mode, empty-plan handling, plan format).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejected during validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid orchestrator configuration: {0}")]
pub struct InvalidConfig(pub String);

/// Sampling settings for one kind of call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallSettings {
    /// Sampling temperature in `[0, 1]`
    pub temperature: f32,
    /// Token limit, must be positive
    pub max_tokens: u32,
}

impl CallSettings {
    /// Build settings
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    fn validate(&self, name: &str) -> Result<(), InvalidConfig> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(InvalidConfig(format!(
                "{}.temperature must be within [0, 1], got {}",
                name, self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(InvalidConfig(format!("{}.max_tokens must be > 0", name)));
        }
        Ok(())
    }
}

/// How plan steps are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One step at a time, in plan order; abort at the first failure
    #[default]
    Sequential,
    /// Up to `max_parallel_steps` in flight; every step resolves before aggregation
    Concurrent,
}

/// What to do when the planner yields zero steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPlanPolicy {
    /// Run the synthesizer over zero results
    #[default]
    Synthesize,
    /// Fail the run at PLANNING with a parse ambiguity
    Fail,
}

/// Shape the planner is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFormat {
    /// Free text, parsed line by line
    #[default]
    NumberedList,
    /// JSON payload, with heuristic fallback and one repair call
    Json,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Planner call settings
    pub planner: CallSettings,
    /// Executor call settings
    pub executor: CallSettings,
    /// Synthesizer call settings
    pub synthesizer: CallSettings,
    /// Single-call baseline settings
    pub baseline: CallSettings,
    /// Planner output shape
    pub plan_format: PlanFormat,
    /// Step scheduling
    pub execution_mode: ExecutionMode,
    /// In-flight step limit for concurrent execution
    pub max_parallel_steps: usize,
    /// Empty plan handling
    pub empty_plan_policy: EmptyPlanPolicy,
    /// Maximum goal length in characters
    pub max_goal_length: usize,
    /// Lower bound of the synthesizer's target length, in words
    pub synthesis_min_words: u32,
    /// Upper bound of the synthesizer's target length, in words
    pub synthesis_max_words: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            planner: CallSettings::new(0.2, 1024),
            executor: CallSettings::new(0.3, 512),
            synthesizer: CallSettings::new(0.2, 1024),
            baseline: CallSettings::new(0.3, 1024),
            plan_format: PlanFormat::NumberedList,
            execution_mode: ExecutionMode::Sequential,
            max_parallel_steps: 4,
            empty_plan_policy: EmptyPlanPolicy::Synthesize,
            max_goal_length: 10000, // 10KB
            synthesis_min_words: 400,
            synthesis_max_words: 600,
        }
    }
}

impl OrchestratorConfig {
    /// Check every field
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        self.planner.validate("planner")?;
        self.executor.validate("executor")?;
        self.synthesizer.validate("synthesizer")?;
        self.baseline.validate("baseline")?;

        if self.max_parallel_steps == 0 {
            return Err(InvalidConfig("max_parallel_steps must be > 0".to_string()));
        }
        if self.max_goal_length == 0 {
            return Err(InvalidConfig("max_goal_length must be > 0".to_string()));
        }
        if self.synthesis_min_words > self.synthesis_max_words {
            return Err(InvalidConfig(format!(
                "synthesis word band is inverted ({} > {})",
                self.synthesis_min_words, self.synthesis_max_words
            )));
        }
        Ok(())
    }

    /// Check a goal against the configured limits
    pub fn validate_goal(&self, goal: &str) -> Result<(), String> {
        if goal.trim().is_empty() {
            return Err("Goal must not be empty".to_string());
        }
        let length = goal.chars().count();
        if length > self.max_goal_length {
            return Err(format!(
                "Goal too long ({} > {} characters)",
                length, self.max_goal_length
            ));
        }
        Ok(())
    }
}

/// Request body for updating orchestrator configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    /// Planner settings
    pub planner: Option<CallSettings>,
    /// Executor settings
    pub executor: Option<CallSettings>,
    /// Synthesizer settings
    pub synthesizer: Option<CallSettings>,
    /// Baseline settings
    pub baseline: Option<CallSettings>,
    /// Planner output shape
    pub plan_format: Option<PlanFormat>,
    /// Step scheduling
    pub execution_mode: Option<ExecutionMode>,
    /// In-flight step limit
    pub max_parallel_steps: Option<usize>,
    /// Empty plan handling
    pub empty_plan_policy: Option<EmptyPlanPolicy>,
    /// Maximum goal length
    pub max_goal_length: Option<usize>,
    /// Synthesis word band lower bound
    pub synthesis_min_words: Option<u32>,
    /// Synthesis word band upper bound
    pub synthesis_max_words: Option<u32>,
}

/// Validate and apply configuration updates
///
/// The update is applied to a copy and validated as a whole, so a rejected
/// request leaves the caller's configuration untouched.
///
/// # Arguments
/// * `config` - The current config
/// * `request` - The update request with optional fields
///
/// # Returns
/// * `Ok(OrchestratorConfig)` - The updated configuration
/// * `Err(InvalidConfig)` - If the result fails validation
pub fn validate_and_apply_config_update(
    mut config: OrchestratorConfig,
    request: ConfigUpdateRequest,
) -> Result<OrchestratorConfig, InvalidConfig> {
    if let Some(planner) = request.planner {
        config.planner = planner;
    }
    if let Some(executor) = request.executor {
        config.executor = executor;
    }
    if let Some(synthesizer) = request.synthesizer {
        config.synthesizer = synthesizer;
    }
    if let Some(baseline) = request.baseline {
        config.baseline = baseline;
    }
    if let Some(format) = request.plan_format {
        config.plan_format = format;
    }
    if let Some(mode) = request.execution_mode {
        config.execution_mode = mode;
    }
    if let Some(max_parallel) = request.max_parallel_steps {
        config.max_parallel_steps = max_parallel;
    }
    if let Some(policy) = request.empty_plan_policy {
        config.empty_plan_policy = policy;
    }
    if let Some(max_goal) = request.max_goal_length {
        config.max_goal_length = max_goal;
    }
    if let Some(min_words) = request.synthesis_min_words {
        config.synthesis_min_words = min_words;
    }
    if let Some(max_words) = request.synthesis_max_words {
        config.synthesis_max_words = max_words;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.empty_plan_policy, EmptyPlanPolicy::Synthesize);
        assert_eq!(config.executor.max_tokens, 512);
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let mut config = OrchestratorConfig::default();
        config.executor.temperature = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("executor.temperature"));
    }

    #[test]
    fn test_update_applies_valid_fields() {
        let request = ConfigUpdateRequest {
            execution_mode: Some(ExecutionMode::Concurrent),
            max_parallel_steps: Some(2),
            plan_format: Some(PlanFormat::Json),
            ..Default::default()
        };
        let updated =
            validate_and_apply_config_update(OrchestratorConfig::default(), request).unwrap();
        assert_eq!(updated.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(updated.max_parallel_steps, 2);
        assert_eq!(updated.plan_format, PlanFormat::Json);
    }

    #[test]
    fn test_update_rejects_zero_parallelism() {
        let request = ConfigUpdateRequest {
            max_parallel_steps: Some(0),
            ..Default::default()
        };
        let result = validate_and_apply_config_update(OrchestratorConfig::default(), request);
        assert!(result.unwrap_err().to_string().contains("max_parallel_steps"));
    }

    #[test]
    fn test_update_rejects_inverted_word_band() {
        let request = ConfigUpdateRequest {
            synthesis_min_words: Some(800),
            ..Default::default()
        };
        assert!(validate_and_apply_config_update(OrchestratorConfig::default(), request).is_err());
    }

    #[test]
    fn test_update_deserializes_partial_json() {
        let request: ConfigUpdateRequest = serde_json::from_str(
            r#"{"empty_plan_policy": "fail", "executor": {"temperature": 0.1, "max_tokens": 256}}"#,
        )
        .unwrap();
        let updated =
            validate_and_apply_config_update(OrchestratorConfig::default(), request).unwrap();
        assert_eq!(updated.empty_plan_policy, EmptyPlanPolicy::Fail);
        assert_eq!(updated.executor.max_tokens, 256);
    }

    #[test]
    fn test_validate_goal() {
        let config = OrchestratorConfig {
            max_goal_length: 5,
            ..Default::default()
        };
        assert!(config.validate_goal("short").is_ok());
        assert!(config.validate_goal("   ").is_err());
        assert!(config.validate_goal("too long").unwrap_err().contains("too long"));
    }
}
