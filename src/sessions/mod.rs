//! Session management: keys conversation memory by session id.

pub mod in_memory;

pub use in_memory::{
    SessionHandle, SessionMemoryStore, SessionSummary, DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS,
    DEFAULT_SESSION,
};
