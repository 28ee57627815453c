//! Session store - keyed lifecycle manager for research sessions
//!
//! The store is the only place holding mutable shared session state. Each
//! session sits behind its own lock so unrelated sessions never contend;
//! the outer map lock is held only for entry lookup, never across an
//! update.

use super::types::ResearchSession;
use crate::{ResearchError, ResearchResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

type SessionEntry = Arc<RwLock<ResearchSession>>;

/// Arena of research sessions keyed by workflow id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session; returns its workflow id
    pub async fn create(&self, session: ResearchSession) -> String {
        let id = session.id.clone();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), Arc::new(RwLock::new(session)));
        info!(workflow_id = %id, "Created research session");
        id
    }

    /// Get a point-in-time snapshot of a session
    pub async fn get(&self, id: &str) -> ResearchResult<ResearchSession> {
        let entry = self.entry(id).await?;
        let session = entry.read().await;
        Ok(session.clone())
    }

    /// Apply an atomic read-modify-write under the session's own lock.
    ///
    /// Refuses mutation of terminal sessions; terminal states are absorbing.
    pub async fn update<R>(
        &self,
        id: &str,
        mutator: impl FnOnce(&mut ResearchSession) -> R,
    ) -> ResearchResult<R> {
        let entry = self.entry(id).await?;
        let mut session = entry.write().await;
        if session.is_terminal() {
            return Err(ResearchError::session(format!(
                "session {} is already terminal ({})",
                id, session.status
            )));
        }
        let out = mutator(&mut session);
        session.updated_at = chrono::Utc::now();
        Ok(out)
    }

    /// Flag a running session for cancellation.
    ///
    /// A no-op on terminal sessions; the orchestrator observes the flag at
    /// the next round boundary.
    pub async fn request_cancel(&self, id: &str) -> ResearchResult<()> {
        let entry = self.entry(id).await?;
        let mut session = entry.write().await;
        if session.is_terminal() {
            debug!(workflow_id = %id, "Cancellation requested on terminal session, ignoring");
            return Ok(());
        }
        session.cancel_requested = true;
        session.updated_at = chrono::Utc::now();
        info!(workflow_id = %id, "Cancellation requested");
        Ok(())
    }

    /// Snapshot every stored session, for operational visibility
    pub async fn list(&self) -> Vec<ResearchSession> {
        let entries: Vec<SessionEntry> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(entry.read().await.clone());
        }
        snapshots
    }

    /// Evict a session. Terminal sessions stay retrievable until this is
    /// called; retention policy belongs to the deployment.
    pub async fn remove(&self, id: &str) -> ResearchResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ResearchError::not_found(format!("session {}", id)))
    }

    async fn entry(&self, id: &str) -> ResearchResult<SessionEntry> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| ResearchError::not_found(format!("session {}", id)))
    }
}
