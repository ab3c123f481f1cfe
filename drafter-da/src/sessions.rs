//! Session store
//!
//! **[DA-WF-030]** Explicitly constructed, injectable store keyed by
//! session identifier. The in-memory backing is per process and loses
//! sessions across restarts; that matches the intended deployment (one
//! worker owns its sessions) and is recorded as a known limitation.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::AnalysisSession;

/// Storage interface for analysis sessions
///
/// `update` exists so the owning pipeline can mutate a session in place
/// without a read-modify-write race against status polling.
pub trait SessionStore: Send + Sync {
    /// Fetch a snapshot of a session
    fn get(&self, id: &Uuid) -> Option<AnalysisSession>;

    /// Register or replace a session
    fn put(&self, session: AnalysisSession);

    /// Mutate a session in place; returns false when the id is unknown
    fn update(&self, id: &Uuid, f: &mut dyn FnMut(&mut AnalysisSession)) -> bool;

    /// Remove sessions older than `max_age`; returns how many were removed
    fn sweep(&self, max_age: chrono::Duration) -> usize;
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, AnalysisSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &Uuid) -> Option<AnalysisSession> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn put(&self, session: AnalysisSession) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.session_id, session);
    }

    fn update(&self, id: &Uuid, f: &mut dyn FnMut(&mut AnalysisSession)) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    fn sweep(&self, max_age: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - max_age;
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| s.started_at > cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, "Session retention sweep");
        }
        removed
    }
}
