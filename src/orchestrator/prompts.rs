//! Role instructions and prompt templates
//!
//! Every generation call the orchestrator issues is built here.

/// Planner role instruction for free-text (numbered list) plans
pub const PLANNER_SYSTEM: &str = "You are a planning agent. Given a research goal, produce a numbered plan \
of 3-5 concrete, answerable steps. Each step must:\n\
  - Start with an action verb (Explain, Compare, Describe, List, Define)\n\
  - Be independently answerable in 1-2 paragraphs\n\
  - Produce a verifiable piece of information\n\
Format: return ONLY the numbered list, one step per line. No preamble, no commentary.";

/// Planner role instruction for structured (JSON) plans
pub const PLANNER_JSON_SYSTEM: &str = "You are a planning agent. Given a research goal, produce a plan \
of 3-5 concrete, answerable steps. Each step must start with an action verb (Explain, Compare, \
Describe, List, Define), be independently answerable in 1-2 paragraphs, and produce a verifiable \
piece of information.\n\
Format: return ONLY a JSON object of the form {\"steps\": [\"<step>\", ...]}. No other text.";

/// Executor role instruction
pub const EXECUTOR_SYSTEM: &str = "You are an execution agent. You will be given one specific step from a \
research plan. Answer it thoroughly in 2-4 paragraphs. Be concrete and specific. Focus exclusively \
on the assigned step and do not attempt the other steps.";

/// Baseline role instruction
pub const BASELINE_SYSTEM: &str =
    "You are a knowledgeable research assistant. Answer the following question thoroughly.";

/// Synthesizer role instruction targeting `min_words`-`max_words`
pub fn synthesizer_system(min_words: u32, max_words: u32) -> String {
    format!(
        "You are a synthesis agent. You will receive a research goal and the results of several \
execution steps. Combine them into a single, coherent, well-structured response that directly \
answers the research goal. Eliminate redundancy. Use headers if the response benefits from \
structure. Target {}-{} words.",
        min_words, max_words
    )
}

/// Planner user prompt
pub fn planner_prompt(goal: &str) -> String {
    format!("Research goal: {}\n\nPlan:", goal)
}

/// Follow-up prompt when a structured plan could not be decoded
pub fn plan_repair_prompt(goal: &str, previous_output: &str, problem: &str) -> String {
    format!(
        "Research goal: {}\n\nYour previous plan could not be used ({}). Previous output:\n{}\n\n\
Return the plan again as a JSON object of the form {{\"steps\": [\"<step>\", ...]}} with 3-5 steps.",
        goal, problem, previous_output
    )
}

/// Executor user prompt for one step
pub fn executor_prompt(goal: &str, step: &str) -> String {
    format!(
        "Overall research goal (for context): {}\n\nYour assigned step: {}\n\nExecute this step:",
        goal, step
    )
}

/// Synthesizer user prompt around a rendered step-results block
pub fn synthesizer_prompt(goal: &str, step_results: &str) -> String {
    format!(
        "Research goal: {}\n\nStep results:\n{}\n\nSynthesized answer:",
        goal, step_results
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_instruction_constrains_shape() {
        assert!(PLANNER_SYSTEM.contains("3-5"));
        assert!(PLANNER_SYSTEM.contains("action verb"));
        assert!(PLANNER_SYSTEM.contains("independently answerable"));
        assert!(PLANNER_SYSTEM.contains("No preamble"));
        assert!(PLANNER_JSON_SYSTEM.contains("\"steps\""));
    }

    #[test]
    fn test_executor_prompt_includes_goal_and_step() {
        let prompt = executor_prompt("Learn ML", "Define supervised learning");
        assert!(prompt.contains("Learn ML"));
        assert!(prompt.contains("Your assigned step: Define supervised learning"));
        assert!(EXECUTOR_SYSTEM.contains("2-4 paragraphs"));
    }

    #[test]
    fn test_synthesizer_system_word_band() {
        let system = synthesizer_system(400, 600);
        assert!(system.contains("Target 400-600 words"));
        assert!(system.contains("Eliminate redundancy"));
    }

    #[test]
    fn test_repair_prompt_quotes_previous_output() {
        let prompt = plan_repair_prompt("goal", "not json", "expected value at line 1");
        assert!(prompt.contains("not json"));
        assert!(prompt.contains("expected value at line 1"));
        assert!(prompt.contains("{\"steps\""));
    }
}
