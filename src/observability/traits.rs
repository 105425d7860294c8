use std::time::Duration;

/// Events emitted by the reasoning loop, the router and the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    LoopStarted {
        agent: String,
    },
    /// One completion was parsed; `action` is `None` for a final answer or a
    /// parse error.
    Decision {
        agent: String,
        iteration: usize,
        action: Option<String>,
    },
    ToolCall {
        agent: String,
        tool: String,
        success: bool,
        duration: Duration,
    },
    LoopFinished {
        agent: String,
        outcome: String,
        iterations: usize,
        duration: Duration,
    },
    RouteResolved {
        decision: String,
        agent: Option<String>,
    },
    DispatchCompleted {
        agent_used: String,
        session_id: String,
        success: bool,
        duration: Duration,
    },
}

/// Sink for runtime events (logs, metrics).
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    /// Metrics in Prometheus text exposition format, if this observer keeps any.
    fn render_metrics(&self) -> Option<String> {
        None
    }

    fn name(&self) -> &str;
}
