//! Orchestrator utility functions
//!
//! Short hashes used to correlate log lines for one goal or plan.

use crate::orchestrator::plan_types::Plan;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a short hash for a goal string
///
/// Returns an 8-character hexadecimal hash suitable for logging and tracing.
///
/// # Arguments
/// * `goal` - The goal string to hash
///
/// # Returns
/// * `String` - 8-character hexadecimal hash
pub fn hash_goal(goal: &str) -> String {
    let mut hasher = DefaultHasher::new();
    goal.hash(&mut hasher);
    short_hex(hasher.finish())
}

/// Compute a short hash for a plan
///
/// Covers the step count and every step description in order, so two plans
/// with the same steps in a different order hash differently.
pub fn hash_plan(plan: &Plan) -> String {
    let mut hasher = DefaultHasher::new();
    plan.len().hash(&mut hasher);
    for step in plan.steps() {
        step.index.hash(&mut hasher);
        step.description.hash(&mut hasher);
    }
    short_hex(hasher.finish())
}

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Count lines as newlines plus one, so empty text is one line and a
/// trailing newline opens another
pub fn line_count(text: &str) -> usize {
    text.matches('\n').count() + 1
}

fn short_hex(value: u64) -> String {
    format!("{:016x}", value)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_goal_is_stable_and_short() {
        let a = hash_goal("Explain RAG");
        assert_eq!(a.len(), 8);
        assert_eq!(a, hash_goal("Explain RAG"));
        assert_ne!(a, hash_goal("Explain CAG"));
    }

    #[test]
    fn test_hash_plan_depends_on_order() {
        let forward = Plan::from_descriptions(["a", "b"]);
        let backward = Plan::from_descriptions(["b", "a"]);
        assert_eq!(hash_plan(&forward).len(), 8);
        assert_ne!(hash_plan(&forward), hash_plan(&backward));
    }

    #[test]
    fn test_counts() {
        assert_eq!(word_count("one two\nthree  four"), 4);
        assert_eq!(line_count("one\ntwo"), 2);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_line_count_trailing_newline_and_empty() {
        assert_eq!(line_count("a\nb\n"), 3);
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("\n\n"), 3);
    }
}
