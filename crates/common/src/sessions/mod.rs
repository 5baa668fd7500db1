//! Keyed chat session storage
//!
//! Sessions are independent: the outer map lock is held only long
//! enough to find a session, and each session carries its own lock so
//! appends to one session never wait on another.

use crate::errors::{AppError, Result};
use crate::metrics::record_sessions;
use crate::models::{ChatSession, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type SessionHandle = Arc<Mutex<ChatSession>>;

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session and return a copy of it
    pub async fn create(&self) -> ChatSession {
        let session = ChatSession::new();
        let snapshot = session.clone();

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, Arc::new(Mutex::new(session)));
        record_sessions(sessions.len());

        tracing::info!(session_id = %snapshot.id, "Session created");
        snapshot
    }

    async fn handle(&self, id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })
    }

    /// Append a completed turn. Appends on the same session are serialized.
    pub async fn append_turn(&self, id: Uuid, turn: Turn) -> Result<()> {
        let handle = self.handle(id).await?;
        let mut session = handle.lock().await;
        session.push(turn);
        tracing::debug!(session_id = %id, turns = session.turns.len(), "Turn appended");
        Ok(())
    }

    /// Ordered turns of one session
    pub async fn history(&self, id: Uuid) -> Result<Vec<Turn>> {
        let handle = self.handle(id).await?;
        let session = handle.lock().await;
        Ok(session.turns.clone())
    }

    /// Full session snapshot
    pub async fn get(&self, id: Uuid) -> Result<ChatSession> {
        let handle = self.handle(id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_none() {
            return Err(AppError::SessionNotFound { id: id.to_string() });
        }
        record_sessions(sessions.len());
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
