//! Prometheus metrics observer.
//!
//! Metrics exposed:
//!
//! - `helios_tool_calls_total{tool,status}`
//! - `helios_loop_outcomes_total{agent,outcome}`
//! - `helios_dispatch_total{agent}`
//! - `helios_loop_duration_seconds{agent}`
//! - `helios_dispatch_duration_seconds{status}`

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use super::traits::{Observer, ObserverEvent};

pub struct PrometheusObserver {
    registry: Registry,
    tool_calls: IntCounterVec,
    loop_outcomes: IntCounterVec,
    dispatches: IntCounterVec,
    loop_duration: HistogramVec,
    dispatch_duration: HistogramVec,
}

impl PrometheusObserver {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tool_calls = IntCounterVec::new(
            Opts::new("helios_tool_calls_total", "Tool invocations by tool and status"),
            &["tool", "status"],
        )?;
        let loop_outcomes = IntCounterVec::new(
            Opts::new(
                "helios_loop_outcomes_total",
                "Reasoning loop terminations by agent and outcome",
            ),
            &["agent", "outcome"],
        )?;
        let dispatches = IntCounterVec::new(
            Opts::new("helios_dispatch_total", "Dispatched requests by agent used"),
            &["agent"],
        )?;
        let loop_duration = HistogramVec::new(
            HistogramOpts::new(
                "helios_loop_duration_seconds",
                "Reasoning loop wall-clock time by agent",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["agent"],
        )?;
        let dispatch_duration = HistogramVec::new(
            HistogramOpts::new(
                "helios_dispatch_duration_seconds",
                "End-to-end dispatch latency",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["status"],
        )?;

        registry.register(Box::new(tool_calls.clone()))?;
        registry.register(Box::new(loop_outcomes.clone()))?;
        registry.register(Box::new(dispatches.clone()))?;
        registry.register(Box::new(loop_duration.clone()))?;
        registry.register(Box::new(dispatch_duration.clone()))?;

        Ok(Self {
            registry,
            tool_calls,
            loop_outcomes,
            dispatches,
            loop_duration,
            dispatch_duration,
        })
    }
}

fn status_label(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

impl Observer for PrometheusObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::ToolCall { tool, success, .. } => {
                self.tool_calls
                    .with_label_values(&[tool.as_str(), status_label(*success)])
                    .inc();
            }
            ObserverEvent::LoopFinished {
                agent,
                outcome,
                duration,
                ..
            } => {
                self.loop_outcomes
                    .with_label_values(&[agent.as_str(), outcome.as_str()])
                    .inc();
                self.loop_duration
                    .with_label_values(&[agent.as_str()])
                    .observe(duration.as_secs_f64());
            }
            ObserverEvent::DispatchCompleted {
                agent_used,
                success,
                duration,
                ..
            } => {
                if *success {
                    self.dispatches
                        .with_label_values(&[agent_used.as_str()])
                        .inc();
                }
                self.dispatch_duration
                    .with_label_values(&[status_label(*success)])
                    .observe(duration.as_secs_f64());
            }
            ObserverEvent::LoopStarted { .. }
            | ObserverEvent::Decision { .. }
            | ObserverEvent::RouteResolved { .. } => {}
        }
    }

    fn render_metrics(&self) -> Option<String> {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return None;
        }
        String::from_utf8(buffer).ok()
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}
