//! In-memory session store: one conversation memory per session id.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::memory::{ConversationMemory, Exchange};

pub const DEFAULT_SESSION: &str = "default";
pub const DEFAULT_MAX_SESSIONS: usize = 1024;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);

/// A session's memory. Hold the lock across snapshot, agent run and append.
pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationMemory>>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub exchanges: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

struct SessionEntry {
    handle: SessionHandle,
    last_used: Instant,
}

impl SessionEntry {
    /// Someone outside the store still holds the handle.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.handle) > 1
    }
}

/// Sessions idle for longer than `idle_ttl` are dropped, and at most
/// `max_sessions` are kept by evicting the least recently used. A session
/// whose handle is held by a running request is never evicted.
pub struct SessionMemoryStore {
    window: usize,
    max_sessions: usize,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionMemoryStore {
    pub fn new(window: usize) -> Self {
        Self::with_limits(window, DEFAULT_MAX_SESSIONS, DEFAULT_IDLE_TTL)
    }

    pub fn with_limits(window: usize, max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            window,
            max_sessions: max_sessions.max(1),
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get the session's memory, creating it on first use.
    pub fn session(&self, id: &str) -> SessionHandle {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        if let Some(entry) = sessions.get_mut(id) {
            entry.last_used = now;
            return Arc::clone(&entry.handle);
        }

        self.evict(&mut sessions, now);
        tracing::debug!(session = id, "Session created");
        let handle = Arc::new(tokio::sync::Mutex::new(ConversationMemory::new(self.window)));
        sessions.insert(
            id.to_string(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_used: now,
            },
        );
        handle
    }

    /// Drop expired sessions, then the least recently used ones until there
    /// is room for one more.
    fn evict(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.in_use() || now.duration_since(entry.last_used) < self.idle_ttl
        });
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.in_use())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else {
                break;
            };
            sessions.remove(&oldest);
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .get(id)
            .map(|entry| Arc::clone(&entry.handle))
    }

    /// Exchanges of a session, oldest first. Waits for any in-flight request
    /// on that session to finish.
    pub async fn exchanges(&self, id: &str) -> Option<Vec<Exchange>> {
        let handle = self.get(id)?;
        let memory = handle.lock().await;
        Some(memory.exchanges().cloned().collect())
    }

    pub async fn summary(&self, id: &str) -> Option<SessionSummary> {
        let handle = self.get(id)?;
        let memory = handle.lock().await;
        Some(SessionSummary {
            id: id.to_string(),
            exchanges: memory.len(),
            last_activity: memory.last_activity(),
        })
    }

    /// Session ids, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget a session's history. Returns whether it existed.
    ///
    /// Waits for an in-flight request on the session, then empties its
    /// memory. The entry itself is removed only when no request holds it, so
    /// concurrent requests keep sharing one memory.
    pub async fn clear(&self, id: &str) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };
        handle.lock().await.clear();

        let mut sessions = self.sessions.lock();
        let unused = sessions.get(id).is_some_and(|entry| {
            Arc::ptr_eq(&entry.handle, &handle) && Arc::strong_count(&handle) == 2
        });
        if unused {
            sessions.remove(id);
        }
        tracing::info!(session = id, removed = unused, "Session cleared");
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for SessionMemoryStore {
    fn default() -> Self {
        Self::new(crate::memory::DEFAULT_WINDOW)
    }
}
