pub mod schema;

pub use schema::{
    AgentConfig, Config, DatabaseConfig, GatewayConfig, MemoryConfig, ObservabilityConfig,
};
