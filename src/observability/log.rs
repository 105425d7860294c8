use super::traits::{Observer, ObserverEvent};

/// Emits every event as a structured `tracing` record.
#[derive(Debug, Clone, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::LoopStarted { agent } => {
                tracing::info!(agent = %agent, "Reasoning loop started");
            }
            ObserverEvent::Decision {
                agent,
                iteration,
                action,
            } => {
                tracing::debug!(
                    agent = %agent,
                    iteration,
                    action = action.as_deref().unwrap_or("-"),
                    "Decision parsed"
                );
            }
            ObserverEvent::ToolCall {
                agent,
                tool,
                success,
                duration,
            } => {
                tracing::info!(
                    agent = %agent,
                    tool = %tool,
                    success,
                    duration_ms = duration.as_millis() as u64,
                    "Tool call"
                );
            }
            ObserverEvent::LoopFinished {
                agent,
                outcome,
                iterations,
                duration,
            } => {
                tracing::info!(
                    agent = %agent,
                    outcome = %outcome,
                    iterations,
                    duration_ms = duration.as_millis() as u64,
                    "Reasoning loop finished"
                );
            }
            ObserverEvent::RouteResolved { decision, agent } => {
                tracing::info!(
                    decision = %decision,
                    agent = agent.as_deref().unwrap_or("unroutable"),
                    "Route resolved"
                );
            }
            ObserverEvent::DispatchCompleted {
                agent_used,
                session_id,
                success,
                duration,
            } => {
                tracing::info!(
                    agent_used = %agent_used,
                    session = %session_id,
                    success,
                    duration_ms = duration.as_millis() as u64,
                    "Dispatch completed"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record_event(&self, _event: &ObserverEvent) {}

    fn name(&self) -> &str {
        "none"
    }
}
