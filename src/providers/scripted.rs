//! Scripted provider: replays canned completions in order.
//!
//! Useful for offline runs and for driving the reasoning loop
//! deterministically. Every prompt it receives is recorded.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::traits::Provider;

pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    /// Returned once the script runs out; `None` makes exhaustion an error
    repeat_last: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            repeat_last: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same completion.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat_last: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(next) = self.responses.lock().pop_front() {
            return Ok(next);
        }
        match &self.repeat_last {
            Some(response) => Ok(response.clone()),
            None => anyhow::bail!("scripted provider has no completions left"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
