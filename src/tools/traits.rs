use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Description of a tool as presented to the reasoning step and the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// A named capability an agent can invoke with a single text input.
///
/// Implementations may read or write the backing store; the reasoning loop
/// never inspects a tool beyond this contract.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (what the completion service writes after `Action:`)
    fn name(&self) -> &str;

    /// Human-readable description shown in the agent prompt
    fn description(&self) -> &str;

    /// Run the tool on raw action input and return the observation text
    async fn run(&self, input: &str) -> anyhow::Result<String>;

    /// Get the full spec for listing
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        async fn run(&self, input: &str) -> anyhow::Result<String> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn spec_uses_name_and_description() {
        let spec = EchoTool.spec();
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.description, "Echo the input back");
    }

    #[tokio::test]
    async fn run_returns_observation_text() {
        let out = EchoTool.run("SELECT 1").await.unwrap();
        assert_eq!(out, "SELECT 1");
    }

    #[test]
    fn tool_spec_serde() {
        let spec = ToolSpec {
            name: "sales_sql_read".into(),
            description: "Read sales data".into(),
        };
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: ToolSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
