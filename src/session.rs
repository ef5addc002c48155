//! Session Store
//!
//! In-memory map of live sessions plus an archive of finished ones.
//! Each live session sits behind its own mutex so turns on one session
//! are serialized while different sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::state::SessionState;

/// Why a session left the live map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ArchiveReason {
    Completed,
    Reset,
    Aborted { error: String },
}

/// Finished session, kept for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub state: SessionState,
    pub reason: ArchiveReason,
    pub archived_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
    archive: RwLock<Vec<ArchivedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, state: SessionState) -> Uuid {
        let id = state.session_id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));
        id
    }

    /// Lock handle for a live session
    pub async fn handle(&self, id: Uuid) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Copy of a live session's state, or of its archived state
    pub async fn snapshot(&self, id: Uuid) -> Option<SessionState> {
        if let Some(handle) = self.handle(id).await {
            return Some(handle.lock().await.clone());
        }
        self.archive
            .read()
            .await
            .iter()
            .rev()
            .find(|a| a.state.session_id == id)
            .map(|a| a.state.clone())
    }

    /// Move a session to the archive. Takes the state by value so callers
    /// holding the session lock can archive without re-locking.
    pub async fn archive(&self, id: Uuid, state: SessionState, reason: ArchiveReason) {
        self.sessions.write().await.remove(&id);
        tracing::info!(session_id = %id, reason = ?reason, "session archived");
        self.archive.write().await.push(ArchivedSession {
            state,
            reason,
            archived_at: Utc::now(),
        });
    }

    pub async fn archived(&self) -> Vec<ArchivedSession> {
        self.archive.read().await.clone()
    }

    pub async fn is_archived(&self, id: Uuid) -> bool {
        self.archive
            .read()
            .await
            .iter()
            .any(|a| a.state.session_id == id)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
