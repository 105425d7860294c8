//! Agents: prompt rendering, completion parsing, the reasoning loop engine,
//! the four domain agents and the router.

pub mod classifier;
pub mod domain;
pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod router;

pub use classifier::match_route;
pub use domain::{AgentKind, DomainAgent};
pub use loop_::{
    AgentError, Exhaustion, LoopConfig, LoopOutcome, LoopRequest, LoopStatus, ReasoningLoop,
    ToolBinding, Toolset,
};
pub use parser::{AgentStep, AmbiguityPolicy, ParseError};
pub use prompt::RolePrompt;
pub use router::RouterAgent;
