//! Planner
//!
//! Issues the planning call and turns its output into a [`Plan`].
//!
//! In numbered-list mode exactly one call is made and the text goes through
//! the line heuristic. In JSON mode the planner asks for a structured payload;
//! when that does not decode, the same text is tried with the line heuristic,
//! and only if that also yields nothing is a single repair call issued.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use crate::orchestrator::config::{CallSettings, OrchestratorConfig, PlanFormat};
use crate::orchestrator::plan_parser::{parse_plan, parse_structured_plan, PlanParseError};
use crate::orchestrator::plan_types::{Goal, Plan};
use crate::orchestrator::prompts;

/// What the planning stage produced
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOutput {
    /// Parsed plan, possibly empty
    pub plan: Plan,
    /// Raw text of the last planner call
    pub raw: String,
    /// Why the plan is empty, when it is
    pub ambiguity: Option<PlanParseError>,
}

impl PlannerOutput {
    fn new(plan: Plan, raw: String) -> Self {
        let ambiguity = plan
            .is_empty()
            .then(|| PlanParseError::NoSteps { raw_len: raw.len() });
        Self {
            plan,
            raw,
            ambiguity,
        }
    }
}

/// Planning stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Planner {
    settings: CallSettings,
    format: PlanFormat,
}

impl Planner {
    /// Planner with explicit call settings and output format
    pub fn new(settings: CallSettings, format: PlanFormat) -> Self {
        Self { settings, format }
    }

    /// Planner configured from `config`
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.planner, config.plan_format)
    }

    /// Produce a plan for `goal`.
    ///
    /// Generation failures propagate unchanged. An empty plan is not an
    /// error here; it is reported through [`PlannerOutput::ambiguity`].
    pub async fn plan(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
    ) -> Result<PlannerOutput, GenerationError> {
        match self.format {
            PlanFormat::NumberedList => self.plan_numbered(service, goal).await,
            PlanFormat::Json => self.plan_structured(service, goal).await,
        }
    }

    async fn plan_numbered(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
    ) -> Result<PlannerOutput, GenerationError> {
        let request = self.request(prompts::planner_prompt(goal.as_str()), prompts::PLANNER_SYSTEM);
        let raw = service.generate(&request).await?;

        tracing::debug!(response_len = raw.len(), "Received planner response");

        let plan = parse_plan(&raw);
        Ok(PlannerOutput::new(plan, raw))
    }

    async fn plan_structured(
        &self,
        service: &dyn GenerationService,
        goal: &Goal,
    ) -> Result<PlannerOutput, GenerationError> {
        let request = self
            .request(prompts::planner_prompt(goal.as_str()), prompts::PLANNER_JSON_SYSTEM)
            .with_json_output(true);
        let raw = service.generate(&request).await?;

        tracing::debug!(response_len = raw.len(), "Received structured planner response");

        let problem = match decode_or_fallback(&raw) {
            Ok(plan) => return Ok(PlannerOutput::new(plan, raw)),
            Err(problem) => problem,
        };

        tracing::warn!(
            error = %problem,
            response_len = raw.len(),
            "Planner output unusable, issuing one repair call"
        );

        let repair = self
            .request(
                prompts::plan_repair_prompt(goal.as_str(), &raw, &problem.to_string()),
                prompts::PLANNER_JSON_SYSTEM,
            )
            .with_json_output(true);
        let repaired = service.generate(&repair).await?;

        let plan = match decode_or_fallback(&repaired) {
            Ok(plan) => {
                tracing::debug!(num_steps = plan.len(), "Planner repair succeeded");
                plan
            }
            Err(e) => {
                tracing::warn!(error = %e, "Planner repair produced no usable steps");
                Plan::default()
            }
        };
        Ok(PlannerOutput::new(plan, repaired))
    }

    fn request(&self, prompt: String, system_instruction: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, system_instruction)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
    }
}

/// Structured decode, then the line heuristic on the same text.
///
/// Returns the structured error when neither yields a step.
fn decode_or_fallback(raw: &str) -> Result<Plan, PlanParseError> {
    match parse_structured_plan(raw) {
        Ok(plan) => Ok(plan),
        Err(structured_error) => {
            let plan = parse_plan(raw);
            if plan.is_empty() {
                Err(structured_error)
            } else {
                tracing::debug!(
                    error = %structured_error,
                    num_steps = plan.len(),
                    "Structured plan rejected, line heuristic recovered steps"
                );
                Ok(plan)
            }
        }
    }
}
