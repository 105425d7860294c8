//! Reasoning loop engine.
//!
//! A bounded think/act/observe state machine. Each iteration asks the
//! completion service for the next step, runs at most one tool, and appends
//! the observation to a per-request scratchpad. The loop ends on a final
//! answer, a return-direct tool result, the iteration ceiling or the
//! wall-clock deadline. Parse errors, unknown tools and tool failures are fed
//! back as observations unless strict mode is on.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::parser::{self, AgentStep, AmbiguityPolicy};
use super::prompt::{self, PromptInputs, RolePrompt};
use crate::config::AgentConfig;
use crate::observability::{Observer, ObserverEvent};
use crate::providers::Provider;
use crate::tools::{RegistryError, Tool, ToolRegistry, ToolSpec};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_MAX_EXECUTION: Duration = Duration::from_secs(60);
pub const DEFAULT_FALLBACK_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// Loop limits and policies. Fixed when the agent is built.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub max_iterations: usize,
    pub max_execution: Duration,
    /// Unknown actions, parse errors and tool failures end the loop with an error
    pub strict: bool,
    pub ambiguity: AmbiguityPolicy,
    pub fallback_answer: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_execution: DEFAULT_MAX_EXECUTION,
            strict: false,
            ambiguity: AmbiguityPolicy::default(),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
        }
    }
}

impl From<&AgentConfig> for LoopConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: if config.max_iterations == 0 {
                DEFAULT_MAX_ITERATIONS
            } else {
                config.max_iterations
            },
            max_execution: Duration::from_secs(config.max_execution_secs),
            strict: config.strict,
            ambiguity: config.ambiguity,
            fallback_answer: config.fallback_answer.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Completion service failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },
    #[error("Request cancelled")]
    Cancelled,
}

/// A tool bound to one agent.
#[derive(Clone)]
pub struct ToolBinding {
    pub tool: Arc<dyn Tool>,
    /// A successful result ends the loop and becomes the answer
    pub return_direct: bool,
}

/// Ordered tools bound to one agent, resolved from the registry up front.
#[derive(Clone, Default)]
pub struct Toolset {
    bindings: Vec<ToolBinding>,
}

impl Toolset {
    /// Resolve `names` from the registry, failing on the first missing tool.
    pub fn resolve(registry: &ToolRegistry, names: &[&str]) -> Result<Self, RegistryError> {
        let bindings = names
            .iter()
            .map(|name| {
                registry.get(name).map(|tool| ToolBinding {
                    tool,
                    return_direct: false,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bindings })
    }

    pub fn with_return_direct(mut self, name: &str) -> Self {
        for binding in &mut self.bindings {
            if binding.tool.name() == name {
                binding.return_direct = true;
            }
        }
        self
    }

    pub fn find(&self, name: &str) -> Option<&ToolBinding> {
        self.bindings.iter().find(|b| b.tool.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.bindings.iter().map(|b| b.tool.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Inputs for one loop invocation.
#[derive(Debug, Clone, Copy)]
pub struct LoopRequest<'a> {
    pub input: &'a str,
    pub history: &'a str,
    /// `(tool, input)` run as the first step without asking the completion service
    pub initial_action: Option<(&'a str, &'a str)>,
}

impl<'a> LoopRequest<'a> {
    pub fn new(input: &'a str, history: &'a str) -> Self {
        Self {
            input,
            history,
            initial_action: None,
        }
    }

    pub fn with_initial_action(mut self, tool: &'a str, input: &'a str) -> Self {
        self.initial_action = Some((tool, input));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    IterationLimit,
    TimeLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Finished,
    Exhausted(Exhaustion),
}

impl LoopStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Exhausted(Exhaustion::IterationLimit) => "iteration_limit",
            Self::Exhausted(Exhaustion::TimeLimit) => "time_limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Final answer, return-direct observation, or the fallback text
    pub answer: String,
    pub iterations: usize,
    pub tool_calls: usize,
    pub status: LoopStatus,
}

#[derive(Debug, Default)]
struct LoopStats {
    iterations: usize,
    tool_calls: usize,
}

/// Await `fut` until the deadline, aborting on cancellation.
///
/// `Ok(None)` means the deadline passed first.
async fn bounded<F: Future>(
    deadline: Instant,
    cancel: &CancellationToken,
    fut: F,
) -> Result<Option<F::Output>, AgentError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AgentError::Cancelled),
        res = tokio::time::timeout_at(deadline, fut) => Ok(res.ok()),
    }
}

pub struct ReasoningLoop {
    agent: String,
    role: RolePrompt,
    toolset: Toolset,
    provider: Arc<dyn Provider>,
    config: LoopConfig,
    observer: Arc<dyn Observer>,
}

impl ReasoningLoop {
    pub fn new(
        agent: impl Into<String>,
        role: RolePrompt,
        toolset: Toolset,
        provider: Arc<dyn Provider>,
        config: LoopConfig,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            agent: agent.into(),
            role,
            toolset,
            provider,
            config,
            observer,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn toolset(&self) -> &Toolset {
        &self.toolset
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub async fn run(
        &self,
        request: LoopRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome, AgentError> {
        let started = Instant::now();
        self.observer.record_event(&ObserverEvent::LoopStarted {
            agent: self.agent.clone(),
        });

        let mut stats = LoopStats::default();
        let span = tracing::info_span!("reasoning_loop", agent = %self.agent);
        let result = self
            .drive(request, cancel, started, &mut stats)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(outcome) => outcome.status.label(),
            Err(AgentError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        self.observer.record_event(&ObserverEvent::LoopFinished {
            agent: self.agent.clone(),
            outcome: outcome.to_string(),
            iterations: stats.iterations,
            duration: started.elapsed(),
        });
        result
    }

    fn outcome(&self, stats: &LoopStats, status: LoopStatus, answer: Option<String>) -> LoopOutcome {
        if let LoopStatus::Exhausted(reason) = status {
            tracing::warn!(
                iterations = stats.iterations,
                reason = status.label(),
                "Reasoning loop exhausted: {reason:?}"
            );
        }
        LoopOutcome {
            answer: answer.unwrap_or_else(|| self.config.fallback_answer.clone()),
            iterations: stats.iterations,
            tool_calls: stats.tool_calls,
            status,
        }
    }

    async fn drive(
        &self,
        request: LoopRequest<'_>,
        cancel: &CancellationToken,
        started: Instant,
        stats: &mut LoopStats,
    ) -> Result<LoopOutcome, AgentError> {
        let deadline = started + self.config.max_execution;
        let specs = self.toolset.specs();
        let mut scratchpad = String::new();
        let mut seeded = request.initial_action.map(|(tool, input)| {
            (
                format!("I need to use {tool} to handle this request.\nAction: {tool}\nAction Input: {input}"),
                AgentStep::Action {
                    tool: tool.to_string(),
                    input: input.to_string(),
                },
            )
        });

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if stats.iterations >= self.config.max_iterations {
                let status = LoopStatus::Exhausted(Exhaustion::IterationLimit);
                return Ok(self.outcome(stats, status, None));
            }
            if Instant::now() >= deadline {
                let status = LoopStatus::Exhausted(Exhaustion::TimeLimit);
                return Ok(self.outcome(stats, status, None));
            }
            stats.iterations += 1;
            tracing::debug!(iteration = stats.iterations, "ReAct iteration");

            // Awaiting decision
            let (raw, parsed) = if let Some((raw, step)) = seeded.take() {
                (raw, Ok(step))
            } else {
                let prompt = prompt::render_prompt(
                    &self.role,
                    &PromptInputs {
                        tools: &specs,
                        history: request.history,
                        input: request.input,
                        scratchpad: &scratchpad,
                    },
                );
                let Some(completion) = bounded(deadline, cancel, self.provider.complete(&prompt)).await?
                else {
                    let status = LoopStatus::Exhausted(Exhaustion::TimeLimit);
                    return Ok(self.outcome(stats, status, None));
                };
                let completion = completion.map_err(AgentError::Completion)?;
                let raw = parser::truncate_hallucinated_observation(&completion).to_string();
                let parsed = parser::parse_completion(&raw, self.config.ambiguity);
                (raw, parsed)
            };

            self.observer.record_event(&ObserverEvent::Decision {
                agent: self.agent.clone(),
                iteration: stats.iterations,
                action: match &parsed {
                    Ok(AgentStep::Action { tool, .. }) => Some(tool.clone()),
                    _ => None,
                },
            });

            let observation = match parsed {
                Ok(AgentStep::Finish { answer }) => {
                    return Ok(self.outcome(stats, LoopStatus::Finished, Some(answer)));
                }
                Ok(AgentStep::Action { tool, input }) => {
                    let Some(binding) = self.toolset.find(&tool) else {
                        let message = format!(
                            "{tool} is not a valid tool, try one of [{}].",
                            self.toolset.names().join(", ")
                        );
                        if self.config.strict {
                            return Err(AgentError::InvalidAction(message));
                        }
                        tracing::debug!(tool = %tool, "Unknown tool requested");
                        write_step(&mut scratchpad, &raw, &message);
                        continue;
                    };

                    // Executing tool
                    stats.tool_calls += 1;
                    let tool_started = Instant::now();
                    let Some(result) = bounded(deadline, cancel, binding.tool.run(&input)).await?
                    else {
                        let status = LoopStatus::Exhausted(Exhaustion::TimeLimit);
                        return Ok(self.outcome(stats, status, None));
                    };
                    self.observer.record_event(&ObserverEvent::ToolCall {
                        agent: self.agent.clone(),
                        tool: tool.clone(),
                        success: result.is_ok(),
                        duration: tool_started.elapsed(),
                    });

                    match result {
                        Ok(output) if binding.return_direct => {
                            return Ok(self.outcome(stats, LoopStatus::Finished, Some(output)));
                        }
                        Ok(output) => output,
                        Err(e) => {
                            if self.config.strict {
                                return Err(AgentError::Tool {
                                    tool,
                                    message: format!("{e:#}"),
                                });
                            }
                            format!("Tool '{tool}' failed: {e:#}")
                        }
                    }
                }
                Err(e) => {
                    if self.config.strict {
                        return Err(AgentError::InvalidAction(e.to_string()));
                    }
                    e.to_string()
                }
            };

            write_step(&mut scratchpad, &raw, &observation);
        }
    }
}

fn write_step(scratchpad: &mut String, raw: &str, observation: &str) {
    let _ = write!(scratchpad, "{raw}\nObservation: {observation}\nThought: ");
}
