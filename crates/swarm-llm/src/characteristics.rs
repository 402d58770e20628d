//! Task-characteristic estimation (§4.5 Provider selection algorithm, step 1).
//!
//! A caller may supply an explicit [`TaskCharacteristics`] record via
//! [`crate::GenerationOptions::task`]; otherwise the router estimates one
//! from the prompt text and options, the way `toka-orchestration`'s
//! workstream classifier infers a task's shape from free text rather than
//! requiring every caller to annotate it.

use serde::{Deserialize, Serialize};

/// Coarse task category, used by routing rules (§4.5 Routing rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Default bucket: general text generation.
    Generation,
    /// Prompt concerns debugging or error analysis.
    Debugging,
    /// Prompt concerns summarizing existing content.
    Summarization,
    /// Prompt concerns research or information gathering.
    Research,
}

/// Complexity bucket (§4.5 Provider selection algorithm, step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Small context, simple task.
    Low,
    /// Typical single-turn task.
    Medium,
    /// Large context or involved task.
    High,
    /// Must route to the most capable available provider.
    Critical,
}

/// A task's characterization for routing purposes (§4.5 Routing rule condition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCharacteristics {
    /// Coarse task category.
    pub task_type: TaskType,
    /// Complexity bucket.
    pub complexity: Complexity,
    /// Estimated or supplied context size, in tokens.
    pub context_size: u32,
    /// Iteration count, for rules conditioned on retry depth.
    pub iteration: Option<u32>,
    /// The calling agent's role, if known.
    pub role: Option<String>,
}

/// Characters-per-token used to estimate context size from raw text
/// (§4.5 "context size from token estimate (1 token ≈ 4 characters)").
const CHARS_PER_TOKEN: usize = 4;

/// Complexity-bucket thresholds, in estimated tokens. The source leaves the
/// exact cutoffs unspecified; chosen so a short chat prompt lands `Low` and
/// a handful of pasted files lands `High`.
const LOW_HIGH_BOUND_TOKENS: u32 = 1_000;
const MEDIUM_HIGH_BOUND_TOKENS: u32 = 4_000;
const HIGH_CRITICAL_BOUND_TOKENS: u32 = 16_000;

fn complexity_for_score(score: u32) -> Complexity {
    if score >= HIGH_CRITICAL_BOUND_TOKENS {
        Complexity::Critical
    } else if score >= MEDIUM_HIGH_BOUND_TOKENS {
        Complexity::High
    } else if score >= LOW_HIGH_BOUND_TOKENS {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

fn task_type_for_prompt(prompt: &str) -> TaskType {
    let lower = prompt.to_lowercase();
    if lower.contains("debug") || lower.contains("error") || lower.contains("stack trace") {
        TaskType::Debugging
    } else if lower.contains("summar") {
        TaskType::Summarization
    } else if lower.contains("research") || lower.contains("investigate") {
        TaskType::Research
    } else {
        TaskType::Generation
    }
}

/// Whether `role` is one of the roles the source bumps to at least
/// `critical` complexity (§4.5 "Architect/research roles bump complexity to
/// at least critical").
fn is_criticality_boosting_role(role: &str) -> bool {
    matches!(role.to_lowercase().as_str(), "architect" | "research")
}

/// Estimate a [`TaskCharacteristics`] record from a raw prompt and the
/// caller's options, when no explicit record was supplied.
pub fn estimate(prompt: &str, role: Option<&str>, expected_output_tokens: Option<u32>) -> TaskCharacteristics {
    let context_size = (prompt.len() / CHARS_PER_TOKEN) as u32;
    let expected_output_tokens = expected_output_tokens.unwrap_or(0);
    let role_criticality_boost = match role {
        Some(r) if is_criticality_boosting_role(r) => HIGH_CRITICAL_BOUND_TOKENS,
        _ => 0,
    };
    let score = context_size.max(expected_output_tokens).max(role_criticality_boost);

    TaskCharacteristics {
        task_type: task_type_for_prompt(prompt),
        complexity: complexity_for_score(score),
        context_size,
        iteration: None,
        role: role.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_is_low_complexity_generation() {
        let chars = estimate("write a haiku about rust", None, None);
        assert_eq!(chars.task_type, TaskType::Generation);
        assert_eq!(chars.complexity, Complexity::Low);
    }

    #[test]
    fn debug_keyword_selects_debugging_type() {
        let chars = estimate("please help me debug this stack trace", None, None);
        assert_eq!(chars.task_type, TaskType::Debugging);
    }

    #[test]
    fn summarize_keyword_selects_summarization_type() {
        let chars = estimate("summarize this article for me", None, None);
        assert_eq!(chars.task_type, TaskType::Summarization);
    }

    #[test]
    fn architect_role_bumps_to_critical() {
        let chars = estimate("short prompt", Some("architect"), None);
        assert_eq!(chars.complexity, Complexity::Critical);
    }

    #[test]
    fn large_prompt_raises_complexity() {
        let long_prompt = "x".repeat(20_000);
        let chars = estimate(&long_prompt, None, None);
        assert_eq!(chars.complexity, Complexity::Critical);
    }
}
