use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::loop_::{AgentError, LoopConfig, LoopRequest, ReasoningLoop, Toolset};
use super::prompt::RolePrompt;
use crate::observability::Observer;
use crate::providers::Provider;
use crate::tools::{RegistryError, ToolRegistry, INTENT_CLASSIFIER};

pub const ROUTER_ID: &str = "router_agent";

const ROUTER_ROLE: RolePrompt = RolePrompt {
    role_instructions: "You are a central routing agent for an ERP system. Your task is to analyze \
        a user's request and determine which specialized agent can best handle it.",
    tool_guidance: "Available Agents:\n\
        - sales_agent: Handles customers, leads, and orders.\n\
        - analytics_agent: Provides insights and reports from data.\n\
        - finance_agent: Manages invoices and financial transactions.\n\
        - inventory_agent: Controls stock levels and supplier orders.\n\n\
        Use the tool to classify the request and then state the name of the appropriate agent.",
    with_history: false,
};

/// Picks the domain agent for a request.
///
/// The classifier call is seeded with the raw input and returns directly, so
/// a successful route costs exactly one tool call. Routing never sees
/// conversation memory.
pub struct RouterAgent {
    engine: ReasoningLoop,
}

impl RouterAgent {
    pub fn new(
        registry: &ToolRegistry,
        provider: Arc<dyn Provider>,
        config: LoopConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RegistryError> {
        let toolset =
            Toolset::resolve(registry, &[INTENT_CLASSIFIER])?.with_return_direct(INTENT_CLASSIFIER);
        Ok(Self {
            engine: ReasoningLoop::new(ROUTER_ID, ROUTER_ROLE, toolset, provider, config, observer),
        })
    }

    /// Return the raw route decision, trimmed.
    pub async fn route(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let request = LoopRequest::new(input, "").with_initial_action(INTENT_CLASSIFIER, input);
        let outcome = self.engine.run(request, cancel).await?;
        Ok(outcome.answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopObserver;
    use crate::providers::ScriptedProvider;
    use crate::store::ErpStore;
    use crate::tools::build_registry;

    fn router(provider: Arc<ScriptedProvider>) -> RouterAgent {
        let registry =
            build_registry(&ErpStore::open_in_memory().unwrap(), provider.clone()).unwrap();
        RouterAgent::new(&registry, provider, LoopConfig::default(), Arc::new(NoopObserver))
            .unwrap()
    }

    #[tokio::test]
    async fn routes_with_a_single_classifier_call() {
        let provider = Arc::new(ScriptedProvider::new(["  inventory_agent  "]));
        let decision = router(provider.clone())
            .route("How many widgets are in stock?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision, "inventory_agent");
        assert_eq!(provider.call_count(), 1);
        assert!(provider.prompts()[0].contains("Request: How many widgets are in stock?"));
    }

    #[test]
    fn requires_the_classifier_tool() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::repeating("x"));
        let result = RouterAgent::new(
            &ToolRegistry::new(),
            provider,
            LoopConfig::default(),
            Arc::new(NoopObserver),
        );
        assert_eq!(
            result.err(),
            Some(RegistryError::NotFound(INTENT_CLASSIFIER.into()))
        );
    }
}
