use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Tool;
use crate::providers::Provider;

/// Asks the completion service which domain agent should handle a request.
pub struct IntentClassifierTool {
    provider: Arc<dyn Provider>,
}

impl IntentClassifierTool {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn classification_prompt(request: &str) -> String {
        format!(
            "Classify the following ERP request and reply with exactly one agent name.\n\n\
             Agents:\n\
             - sales_agent: customers, leads, and orders\n\
             - analytics_agent: insights, reports, and definitions of business terms\n\
             - finance_agent: invoices and financial transactions\n\
             - inventory_agent: products, stock levels, and supplier orders\n\n\
             Request: {request}\n\
             Agent:"
        )
    }
}

#[async_trait]
impl Tool for IntentClassifierTool {
    fn name(&self) -> &str {
        super::INTENT_CLASSIFIER
    }

    fn description(&self) -> &str {
        "Classifies a user request and returns the name of the agent that should handle it \
         (sales_agent, analytics_agent, finance_agent or inventory_agent). Input: the request."
    }

    async fn run(&self, input: &str) -> Result<String> {
        let reply = self
            .provider
            .complete(&Self::classification_prompt(input.trim()))
            .await?;
        Ok(reply
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedProvider;

    #[tokio::test]
    async fn returns_first_non_empty_line() {
        let provider = Arc::new(ScriptedProvider::new(["\n  finance_agent \nbecause invoices"]));
        let tool = IntentClassifierTool::new(provider.clone());
        assert_eq!(tool.run("show unpaid invoices").await.unwrap(), "finance_agent");
        assert!(provider.prompts()[0].contains("Request: show unpaid invoices"));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let tool = IntentClassifierTool::new(Arc::new(ScriptedProvider::new(Vec::<String>::new())));
        assert!(tool.run("anything").await.is_err());
    }
}
