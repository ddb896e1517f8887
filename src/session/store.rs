//! Per-session state and its in-memory store
//!
//! Each session owns its history, user id and category; sessions share
//! nothing mutable.

use crate::models::ProductCategory;
use crate::session::history::ConversationHistory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub category: ProductCategory,
    pub history: ConversationHistory,
}

impl Session {
    pub fn new(user_id: Option<String>, category: ProductCategory) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, category)
    }

    pub fn with_id(session_id: Uuid, user_id: Option<String>, category: ProductCategory) -> Self {
        Self {
            session_id,
            user_id: user_id.filter(|id| !id.trim().is_empty()),
            category,
            history: ConversationHistory::new(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// In-memory session store for development. Sessions are never evicted.
///
/// Each session sits behind its own lock; a turn holds it from start to
/// finish, so turns on one session run one after another and none is lost.
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle to an existing session, or to a fresh one under `session_id`
    pub async fn get_or_create(
        &self,
        session_id: Uuid,
        user_id: Option<String>,
        category: ProductCategory,
    ) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&session_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::with_id(session_id, user_id, category))))
            .clone()
    }

    /// Snapshot of a session; waits for a turn in progress to finish
    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        let handle = self.sessions.read().await.get(&session_id).cloned()?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Clear the history; false when the session does not exist
    pub async fn reset(&self, session_id: Uuid) -> bool {
        let handle = self.sessions.read().await.get(&session_id).cloned();
        match handle {
            Some(handle) => {
                handle.lock().await.history.reset();
                true
            }
            None => false,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_then_reset() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        {
            let handle = store.get_or_create(id, Some("user_1".into()), ProductCategory::Deposit).await;
            handle.lock().await.history.record_turn("q", "a");
        }

        let handle = store.get_or_create(id, None, ProductCategory::Both).await;
        let loaded = handle.lock().await.clone();
        assert_eq!(loaded.user_id.as_deref(), Some("user_1"));
        assert_eq!(loaded.category, ProductCategory::Deposit);
        assert_eq!(loaded.history.len(), 2);

        assert!(store.reset(id).await);
        assert!(store.get(id).await.map_or(false, |s| s.history.is_empty()));
        assert!(!store.reset(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_interleaved_turns_keep_both() {
        let store = Arc::new(SessionStore::new());
        let id = Uuid::new_v4();

        let first = store.get_or_create(id, None, ProductCategory::Deposit).await;
        let second = store.get_or_create(id, None, ProductCategory::Deposit).await;

        let turn = |handle: Arc<Mutex<Session>>, q: &'static str| async move {
            let mut session = handle.lock().await;
            tokio::task::yield_now().await;
            session.history.record_turn(q, "a");
        };
        tokio::join!(turn(first, "q1"), turn(second, "q2"));

        let history = store.get(id).await.map(|s| s.history).unwrap_or_default();
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_blank_user_id_is_guest() {
        assert!(Session::new(Some("  ".into()), ProductCategory::Unspecified).is_guest());
    }
}
