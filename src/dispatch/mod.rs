//! Request dispatch: route, run the chosen domain agent against the session's
//! memory, record the exchange.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::agent::{match_route, AgentError, AgentKind, DomainAgent, LoopConfig, RouterAgent};
use crate::config::Config;
use crate::memory::Exchange;
use crate::observability::{Observer, ObserverEvent};
use crate::providers::Provider;
use crate::sessions::{SessionMemoryStore, DEFAULT_SESSION};
use crate::tools::{RegistryError, ToolRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl DispatchRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub response: String,
    /// Raw route decision text
    pub agent_used: String,
    pub session_id: String,
}

pub fn unroutable_response(decision: &str) -> String {
    format!(
        "I couldn't find an agent for that task. The request was routed to: '{decision}'."
    )
}

pub struct Dispatcher {
    router: RouterAgent,
    agents: HashMap<AgentKind, DomainAgent>,
    sessions: Arc<SessionMemoryStore>,
    per_session: bool,
    observer: Arc<dyn Observer>,
}

impl Dispatcher {
    /// Build the router and all four domain agents. Fails if any tool they
    /// need is missing from the registry.
    pub fn new(
        registry: &ToolRegistry,
        provider: Arc<dyn Provider>,
        loop_config: LoopConfig,
        sessions: Arc<SessionMemoryStore>,
        per_session: bool,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RegistryError> {
        let router = RouterAgent::new(
            registry,
            Arc::clone(&provider),
            loop_config.clone(),
            Arc::clone(&observer),
        )?;
        let mut agents = HashMap::with_capacity(AgentKind::ALL.len());
        for kind in AgentKind::ALL {
            let agent = DomainAgent::new(
                kind,
                registry,
                Arc::clone(&provider),
                loop_config.clone(),
                Arc::clone(&observer),
            )?;
            agents.insert(kind, agent);
        }
        Ok(Self {
            router,
            agents,
            sessions,
            per_session,
            observer,
        })
    }

    pub fn from_config(
        config: &Config,
        registry: &ToolRegistry,
        provider: Arc<dyn Provider>,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RegistryError> {
        Self::new(
            registry,
            provider,
            LoopConfig::from(&config.agent),
            Arc::new(SessionMemoryStore::with_limits(
                config.memory.window,
                config.memory.max_sessions,
                Duration::from_secs(config.memory.session_idle_secs),
            )),
            config.memory.per_session,
            observer,
        )
    }

    pub fn sessions(&self) -> &Arc<SessionMemoryStore> {
        &self.sessions
    }

    /// Session a request lands in. Blank or missing ids, and every id when
    /// per-session memory is off, map to the default session.
    pub fn session_id_for(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if self.per_session && !id.is_empty() => id.to_string(),
            _ => DEFAULT_SESSION.to_string(),
        }
    }

    /// Handle one request end to end.
    ///
    /// The session lock is held from the memory snapshot until the exchange
    /// is appended, so requests on the same session run one at a time. Memory
    /// is only updated when the run succeeds.
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, AgentError> {
        let started = Instant::now();
        let session_id = self.session_id_for(request.session_id.as_deref());
        let handle = self.sessions.session(&session_id);
        let mut memory = tokio::select! {
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
            guard = handle.lock() => guard,
        };
        let history = memory.snapshot();

        let result = self.route_and_run(&request.prompt, &history, cancel).await;

        let (success, agent_used) = match &result {
            Ok((_, decision)) => (true, decision.clone()),
            Err(_) => (false, String::new()),
        };
        self.observer.record_event(&ObserverEvent::DispatchCompleted {
            agent_used,
            session_id: session_id.clone(),
            success,
            duration: started.elapsed(),
        });

        let (response, agent_used) = result?;
        memory.append(Exchange::new(request.prompt, response.clone()));
        Ok(DispatchResponse {
            response,
            agent_used,
            session_id,
        })
    }

    async fn route_and_run(
        &self,
        prompt: &str,
        history: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, String), AgentError> {
        let decision = self.router.route(prompt, cancel).await?;
        let kind = match_route(&decision);
        self.observer.record_event(&ObserverEvent::RouteResolved {
            decision: decision.clone(),
            agent: kind.map(|k| k.id().to_string()),
        });

        let response = match kind.and_then(|k| self.agents.get(&k)) {
            Some(agent) => agent.run(prompt, history, cancel).await?,
            None => {
                tracing::warn!(decision = %decision, "Request could not be routed");
                unroutable_response(&decision)
            }
        };
        Ok((response, decision))
    }
}
