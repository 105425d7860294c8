//! Completion parsing: turns free text from the completion service into the
//! next loop step.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const OBSERVATION_MARKER: &str = "\nObservation:";

/// What to do when one completion carries both an action and a final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// The final answer wins and the loop ends
    #[default]
    FinalAnswer,
    /// The action runs and the final answer is ignored
    Action,
    /// Treated as a parse error and fed back as an observation
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    Action { tool: String, input: String },
    Finish { answer: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,
    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,
    #[error("Invalid Format: Found both a final answer and an action. Reply with only one of them.")]
    Ambiguous,
    #[error("Could not parse completion: `{0}`")]
    Unparseable(String),
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("action pattern is valid")
    })
}

fn action_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*:").expect("action label pattern is valid"))
}

fn action_input_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("action input label pattern is valid")
    })
}

/// Drop everything from the first observation the model invented for itself.
pub fn truncate_hallucinated_observation(completion: &str) -> &str {
    match completion.find(OBSERVATION_MARKER) {
        Some(idx) => &completion[..idx],
        None => completion,
    }
}

/// The action input ends where a final answer starts.
fn clean_action_input(raw: &str) -> String {
    let raw = match raw.find(FINAL_ANSWER_MARKER) {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    raw.trim().trim_matches('"').trim().to_string()
}

/// Parse one (already truncated) completion.
pub fn parse_completion(text: &str, policy: AmbiguityPolicy) -> Result<AgentStep, ParseError> {
    let final_answer = text
        .rfind(FINAL_ANSWER_MARKER)
        .map(|idx| text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string());

    if let Some(caps) = action_regex().captures(text) {
        let action = AgentStep::Action {
            tool: caps[1].trim().to_string(),
            input: clean_action_input(&caps[2]),
        };
        return match (final_answer, policy) {
            (None, _) | (Some(_), AmbiguityPolicy::Action) => Ok(action),
            (Some(answer), AmbiguityPolicy::FinalAnswer) => Ok(AgentStep::Finish { answer }),
            (Some(_), AmbiguityPolicy::Reject) => Err(ParseError::Ambiguous),
        };
    }

    if let Some(answer) = final_answer {
        return Ok(AgentStep::Finish { answer });
    }
    if !action_label_regex().is_match(text) {
        return Err(ParseError::MissingAction);
    }
    if !action_input_label_regex().is_match(text) {
        return Err(ParseError::MissingActionInput);
    }
    Err(ParseError::Unparseable(text.trim().to_string()))
}
