//! Planner output parsing
//!
//! Two strategies turn planner text into a [`Plan`]:
//!
//! - [`parse_plan`]: best-effort extraction of numbered or bulleted lines from
//!   free text. Lines that do not look like list items are dropped.
//! - [`parse_structured_plan`]: strict decoding of a JSON payload
//!   (`{"steps": [...]}` or a bare array), reporting a [`PlanParseError`] when
//!   the payload does not match.
//!
//! Both are pure: the same input always yields the same plan.

use crate::orchestrator::plan_types::Plan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Planner output could not be turned into a usable plan
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PlanParseError {
    /// Nothing in the planner output qualified as a step
    #[error("Planner output ({raw_len} bytes) contained no usable steps")]
    NoSteps {
        /// Length of the raw planner text
        raw_len: usize,
    },

    /// Structured payload did not match the expected shape
    #[error("Malformed structured plan: {message}")]
    Malformed {
        /// Decoder message
        message: String,
    },
}

/// Extract list items from free-form planner text.
///
/// A line is a candidate when, trimmed, it starts with a digit or a dash. The
/// leading run of digits, `.`, `)`, `-` and whitespace is stripped and whatever
/// remains (if anything) becomes the next step. Every other line is dropped.
///
/// # Example
/// ```
/// use plan_execute_agent::orchestrator::plan_parser::parse_plan;
///
/// let plan = parse_plan("Intro\n1. Explain X\n- Compare Y\n\n2) Describe Z");
/// assert_eq!(plan.descriptions(), vec!["Explain X", "Compare Y", "Describe Z"]);
/// ```
pub fn parse_plan(raw: &str) -> Plan {
    Plan::from_descriptions(raw.lines().filter_map(extract_step))
}

fn extract_step(line: &str) -> Option<&str> {
    let line = line.trim();
    let first = line.chars().next()?;
    if !(first.is_ascii_digit() || first == '-') {
        return None;
    }

    let cleaned = line
        .trim_start_matches(|c: char| {
            c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | ')' | '-')
        })
        .trim();

    (!cleaned.is_empty()).then_some(cleaned)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructuredPlan {
    Object { steps: Vec<StructuredStep> },
    List(Vec<StructuredStep>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructuredStep {
    Text(String),
    Described { description: String },
    Titled { step: String },
}

impl StructuredStep {
    fn into_text(self) -> String {
        match self {
            StructuredStep::Text(text)
            | StructuredStep::Described { description: text }
            | StructuredStep::Titled { step: text } => text,
        }
    }
}

/// Decode a JSON plan payload.
///
/// Accepts `{"steps": [...]}` or a bare array, where each entry is a string or
/// an object with a `description` (or `step`) field. Markdown code fences
/// around the payload are tolerated. Blank entries are dropped.
///
/// # Errors
/// * `PlanParseError::Malformed` if the text is not a recognised payload
/// * `PlanParseError::NoSteps` if the payload decodes but holds no non-blank step
pub fn parse_structured_plan(raw: &str) -> Result<Plan, PlanParseError> {
    let payload = strip_code_fence(raw);

    let decoded: StructuredPlan =
        serde_json::from_str(payload).map_err(|e| PlanParseError::Malformed {
            message: e.to_string(),
        })?;

    let entries = match decoded {
        StructuredPlan::Object { steps } | StructuredPlan::List(steps) => steps,
    };

    let descriptions: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.into_text().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if descriptions.is_empty() {
        return Err(PlanParseError::NoSteps { raw_len: raw.len() });
    }

    Ok(Plan::from_descriptions(descriptions))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_markers_and_preamble() {
        let plan = parse_plan("Intro\n1. Explain X\n- Compare Y\n\n2) Describe Z");
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.descriptions(),
            vec!["Explain X", "Compare Y", "Describe Z"]
        );
        for (i, step) in plan.steps().iter().enumerate() {
            assert_eq!(step.index, i);
        }
    }

    #[test]
    fn test_refusal_yields_empty_plan() {
        assert!(parse_plan("I cannot help with that.").is_empty());
        assert!(parse_plan("").is_empty());
        assert!(parse_plan("\n\n   \n").is_empty());
    }

    #[test]
    fn test_indented_lines_are_trimmed() {
        let plan = parse_plan("   3.   Define the term  \n\t- List examples\t");
        assert_eq!(plan.descriptions(), vec!["Define the term", "List examples"]);
    }

    #[test]
    fn test_marker_only_lines_are_dropped() {
        let plan = parse_plan("1.\n2)\n---\n- \n3. Real step");
        assert_eq!(plan.descriptions(), vec!["Real step"]);
    }

    #[test]
    fn test_non_candidate_lines_are_dropped() {
        let plan = parse_plan("Plan:\n* Bullet with star\n# Header\nStep one: do it\n10. Tenth step");
        assert_eq!(plan.descriptions(), vec!["Tenth step"]);
    }

    #[test]
    fn test_multi_level_numbering_is_stripped() {
        let plan = parse_plan("1.1. Nested item\n2 - Dash separated");
        assert_eq!(plan.descriptions(), vec!["Nested item", "Dash separated"]);
    }

    #[test]
    fn test_leading_numbers_in_content_are_consumed() {
        // The marker strip is greedy: digits right after the marker go too.
        let plan = parse_plan("1. 2024 trends in AI");
        assert_eq!(plan.descriptions(), vec!["trends in AI"]);
    }

    #[test]
    fn test_only_ascii_digits_mark_steps() {
        let plan = parse_plan("½ cup of flour\nⅫ. Roman twelve\n٣. Arabic-Indic three\n1. Real step");
        assert_eq!(plan.descriptions(), vec!["Real step"]);
    }

    #[test]
    fn test_inner_punctuation_is_kept() {
        let plan = parse_plan("1. Compare A (fast) vs. B - slow");
        assert_eq!(plan.descriptions(), vec!["Compare A (fast) vs. B - slow"]);
    }

    #[test]
    fn test_windows_line_endings() {
        let plan = parse_plan("1. One\r\n2. Two\r\n");
        assert_eq!(plan.descriptions(), vec!["One", "Two"]);
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let raw = "Here is the plan\n1. Explain A\n2. Describe B\n- List C";
        let first = parse_plan(raw);
        let second = parse_plan(raw);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_structured_object_payload() {
        let plan =
            parse_structured_plan(r#"{"steps": ["Explain X", "  Compare Y ", ""]}"#).unwrap();
        assert_eq!(plan.descriptions(), vec!["Explain X", "Compare Y"]);
    }

    #[test]
    fn test_structured_bare_array_with_objects() {
        let plan = parse_structured_plan(
            r#"[{"description": "Define RAG"}, {"step": "List use cases"}, "Compare costs"]"#,
        )
        .unwrap();
        assert_eq!(
            plan.descriptions(),
            vec!["Define RAG", "List use cases", "Compare costs"]
        );
    }

    #[test]
    fn test_structured_code_fence_is_tolerated() {
        let raw = "```json\n{\"steps\": [\"Explain X\"]}\n```";
        let plan = parse_structured_plan(raw).unwrap();
        assert_eq!(plan.descriptions(), vec!["Explain X"]);
    }

    #[test]
    fn test_structured_malformed_payload() {
        let err = parse_structured_plan("1. Explain X\n2. Compare Y").unwrap_err();
        assert!(matches!(err, PlanParseError::Malformed { .. }));
    }

    #[test]
    fn test_structured_empty_steps() {
        let err = parse_structured_plan(r#"{"steps": []}"#).unwrap_err();
        assert_eq!(err, PlanParseError::NoSteps { raw_len: 13 });
    }
}
