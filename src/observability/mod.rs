pub mod log;
pub mod prometheus;
pub mod traits;

pub use self::log::{LogObserver, NoopObserver};
pub use self::prometheus::PrometheusObserver;
pub use traits::{Observer, ObserverEvent};

use crate::config::ObservabilityConfig;
use std::sync::Arc;

/// Build the observer selected in config. Unknown backends fall back to logging.
pub fn create_observer(config: &ObservabilityConfig) -> anyhow::Result<Arc<dyn Observer>> {
    match config.backend.as_str() {
        "none" | "noop" => Ok(Arc::new(NoopObserver)),
        "prometheus" => Ok(Arc::new(PrometheusObserver::new()?)),
        "log" => Ok(Arc::new(LogObserver)),
        other => {
            tracing::warn!(backend = other, "Unknown observability backend, using log");
            Ok(Arc::new(LogObserver))
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured default level.
pub fn init_logging(format: &str, default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str) -> ObservabilityConfig {
        ObservabilityConfig {
            backend: backend.into(),
            ..ObservabilityConfig::default()
        }
    }

    #[test]
    fn factory_selects_backend() {
        assert_eq!(create_observer(&config("none")).unwrap().name(), "none");
        assert_eq!(create_observer(&config("log")).unwrap().name(), "log");
        assert_eq!(
            create_observer(&config("prometheus")).unwrap().name(),
            "prometheus"
        );
        assert_eq!(create_observer(&config("statsd")).unwrap().name(), "log");
    }

    #[test]
    fn only_prometheus_renders_metrics() {
        assert!(create_observer(&config("log"))
            .unwrap()
            .render_metrics()
            .is_none());
        assert!(create_observer(&config("prometheus"))
            .unwrap()
            .render_metrics()
            .is_some());
    }
}
