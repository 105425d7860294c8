//! Domain agents: one reasoning loop per ERP area with a fixed role prompt
//! and toolset.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::loop_::{AgentError, LoopConfig, LoopRequest, ReasoningLoop, Toolset};
use super::prompt::RolePrompt;
use crate::observability::Observer;
use crate::providers::Provider;
use crate::tools::{self, RegistryError, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Sales,
    Analytics,
    Finance,
    Inventory,
}

const SALES_ROLE: RolePrompt = RolePrompt {
    role_instructions: "You are a sales and customer relations specialist. Your task is to help \
        users with everything related to customers, leads and orders.",
    tool_guidance: "If the user wants to create, update, or delete data, you must use the \
        sales_sql_write tool.\nIf the user wants to retrieve data, you must use the \
        sales_sql_read tool.\nAfter completing the task, provide a friendly and clear answer.",
    with_history: true,
};

const ANALYTICS_ROLE: RolePrompt = RolePrompt {
    role_instructions: "You are a specialized agent in analytics and reporting. Your task is to \
        answer questions using data from the ERP system.",
    tool_guidance: "To answer any data-related question, you must first use the \
        text_to_sql_tool.\nIf the user asks for a definition of a term, use the glossary_read \
        tool.\nAfter obtaining the result, provide a clear and explanatory answer of the findings.",
    with_history: true,
};

const FINANCE_ROLE: RolePrompt = RolePrompt {
    role_instructions: "You are a specialized financial agent. Your task is to automate financial \
        operations such as invoice processing, ledger updates, and payment tracking.",
    tool_guidance: "If the user wants to create, update, or delete financial data (such as \
        invoices, payments), you must use the finance_sql_write tool.\nIf the user wants to \
        retrieve data, you must use the finance_sql_read tool.",
    with_history: true,
};

const INVENTORY_ROLE: RolePrompt = RolePrompt {
    role_instructions: "You are a specialised agent in inventory and supply chain management. \
        Your task is to oversee inventory levels, manage products, and purchase orders.",
    tool_guidance: "If the user wants to create, update, or delete inventory data (such as \
        inventory levels, purchase orders), you must use the inventory_sql_write tool.\nIf the \
        user wants to retrieve data, you must use the inventory_sql_read tool.",
    with_history: true,
};

impl AgentKind {
    /// Route-matching order.
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Sales,
        AgentKind::Analytics,
        AgentKind::Finance,
        AgentKind::Inventory,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Sales => "sales_agent",
            Self::Analytics => "analytics_agent",
            Self::Finance => "finance_agent",
            Self::Inventory => "inventory_agent",
        }
    }

    /// Identifier matched against route decisions.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Analytics => "analytics",
            Self::Finance => "finance",
            Self::Inventory => "inventory",
        }
    }

    pub fn role(self) -> RolePrompt {
        match self {
            Self::Sales => SALES_ROLE,
            Self::Analytics => ANALYTICS_ROLE,
            Self::Finance => FINANCE_ROLE,
            Self::Inventory => INVENTORY_ROLE,
        }
    }

    pub fn tool_names(self) -> &'static [&'static str] {
        match self {
            Self::Sales => &[tools::SALES_SQL_READ, tools::SALES_SQL_WRITE],
            Self::Analytics => &[tools::TEXT_TO_SQL, tools::GLOSSARY_READ],
            Self::Finance => &[tools::FINANCE_SQL_READ, tools::FINANCE_SQL_WRITE],
            Self::Inventory => &[tools::INVENTORY_SQL_READ, tools::INVENTORY_SQL_WRITE],
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub struct DomainAgent {
    kind: AgentKind,
    engine: ReasoningLoop,
}

impl DomainAgent {
    /// Build the agent, resolving its toolset from the registry.
    pub fn new(
        kind: AgentKind,
        registry: &ToolRegistry,
        provider: Arc<dyn Provider>,
        config: LoopConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RegistryError> {
        let toolset = Toolset::resolve(registry, kind.tool_names())?;
        Ok(Self {
            kind,
            engine: ReasoningLoop::new(kind.id(), kind.role(), toolset, provider, config, observer),
        })
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Answer `input` given the rendered conversation history.
    pub async fn run(
        &self,
        input: &str,
        history: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let outcome = self
            .engine
            .run(LoopRequest::new(input, history), cancel)
            .await?;
        Ok(outcome.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopObserver;
    use crate::providers::ScriptedProvider;
    use crate::store::ErpStore;

    fn registry(provider: Arc<dyn Provider>) -> ToolRegistry {
        tools::build_registry(&ErpStore::open_in_memory().unwrap(), provider).unwrap()
    }

    #[test]
    fn every_kind_resolves_against_the_full_registry() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::repeating("x"));
        let registry = registry(provider.clone());
        for kind in AgentKind::ALL {
            let agent = DomainAgent::new(
                kind,
                &registry,
                provider.clone(),
                LoopConfig::default(),
                Arc::new(NoopObserver),
            )
            .unwrap();
            assert_eq!(agent.kind(), kind);
            assert!(kind.id().starts_with(kind.keyword()));
        }
    }

    #[test]
    fn construction_fails_fast_on_missing_tool() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::repeating("x"));
        let result = DomainAgent::new(
            AgentKind::Sales,
            &ToolRegistry::new(),
            provider,
            LoopConfig::default(),
            Arc::new(NoopObserver),
        );
        assert_eq!(
            result.err(),
            Some(RegistryError::NotFound("sales_sql_read".into()))
        );
    }

    #[tokio::test]
    async fn sales_agent_reads_through_its_tool() {
        let store = ErpStore::open_in_memory().unwrap();
        store
            .execute("INSERT INTO customers (name, email) VALUES ('Initech', 'it@initech.test')")
            .await
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new([
            "I need the customer list.\nAction: sales_sql_read\nAction Input: SELECT name FROM customers",
            "I now know the final answer\nFinal Answer: You have one customer: Initech.",
        ]));
        let registry = tools::build_registry(&store, provider.clone()).unwrap();
        let agent = DomainAgent::new(
            AgentKind::Sales,
            &registry,
            provider.clone(),
            LoopConfig::default(),
            Arc::new(NoopObserver),
        )
        .unwrap();

        let answer = agent
            .run("Who are my customers?", "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "You have one customer: Initech.");

        let prompts = provider.prompts();
        assert!(prompts[0].contains("sales and customer relations specialist"));
        assert!(prompts[0].contains("[sales_sql_read, sales_sql_write]"));
        assert!(prompts[1].contains("Observation: name\nInitech\nThought: "));
    }
}
