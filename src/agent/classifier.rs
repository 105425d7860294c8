use super::domain::AgentKind;

/// Map a route decision to a domain agent.
///
/// Case-insensitive substring match against each agent's keyword, checked in
/// [`AgentKind::ALL`] order. `None` means the request is unroutable.
pub fn match_route(decision: &str) -> Option<AgentKind> {
    let decision = decision.to_lowercase();
    AgentKind::ALL
        .into_iter()
        .find(|kind| decision.contains(kind.keyword()))
}
