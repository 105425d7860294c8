//! Prompt rendering for the reasoning loop.
//!
//! Every role shares one ReAct layout; only the role instructions and the
//! bound tools differ.

use std::fmt::Write;

use crate::tools::ToolSpec;

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

/// Role-specific part of a prompt. One constant instance per agent role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePrompt {
    pub role_instructions: &'static str,
    /// Tool usage rules shown after the tool list
    pub tool_guidance: &'static str,
    /// Render the conversation timeline section
    pub with_history: bool,
}

/// Per-invocation values bound into a [`RolePrompt`].
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub tools: &'a [ToolSpec],
    pub history: &'a str,
    pub input: &'a str,
    pub scratchpad: &'a str,
}

pub fn tool_names(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the full prompt for the next completion.
pub fn render_prompt(role: &RolePrompt, inputs: &PromptInputs<'_>) -> String {
    let mut out = String::with_capacity(1024 + inputs.scratchpad.len() + inputs.history.len());
    out.push_str(role.role_instructions.trim());
    out.push_str("\nYou have access to the following tools:\n");
    for tool in inputs.tools {
        let _ = writeln!(out, "{}: {}", tool.name, tool.description);
    }
    if !role.tool_guidance.is_empty() {
        out.push('\n');
        out.push_str(role.tool_guidance.trim());
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&FORMAT_INSTRUCTIONS.replace("{tool_names}", &tool_names(inputs.tools)));
    out.push_str("\n\n");
    if role.with_history {
        let _ = writeln!(out, "Conversation timeline:\n{}", inputs.history);
    }
    let _ = write!(out, "Question: {}\nThought: {}", inputs.input, inputs.scratchpad);
    out
}
