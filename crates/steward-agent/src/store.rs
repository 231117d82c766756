//! Conversation persistence.
//!
//! The executor only needs two operations: append one message to a session
//! and load the session's ordered history.  [`InMemoryConversationStore`]
//! keeps everything in process memory with one lock per session.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::llm::Message;

/// Append-only, per-session message log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message at the end of the session's history.
    async fn append(&self, session_id: &str, message: Message) -> Result<()>;

    /// The session's history in insertion order.  Unknown sessions are empty.
    async fn load(&self, session_id: &str) -> Result<Vec<Message>>;
}

/// Shared handle to a store.
pub type SharedStore = Arc<dyn ConversationStore>;

type SessionLog = Arc<Mutex<Vec<Message>>>;

/// Process-local store.
///
/// Appends to one session serialize on that session's lock; different
/// sessions never contend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    sessions: Arc<DashMap<String, SessionLog>>,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every session with at least one message.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn session(&self, session_id: &str) -> SessionLog {
        // Clone the Arc so the shard lock is released before awaiting.
        Arc::clone(
            self.sessions
                .entry(session_id.to_owned())
                .or_default()
                .value(),
        )
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, session_id: &str, message: Message) -> Result<()> {
        let log = self.session(session_id);
        let mut messages = log.lock().await;
        messages.push(message);
        tracing::trace!(session_id, len = messages.len(), "message appended");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        let Some(log) = self.sessions.get(session_id).map(|e| Arc::clone(e.value())) else {
            return Ok(Vec::new());
        };
        let messages = log.lock().await;
        Ok(messages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[tokio::test]
    async fn preserves_insertion_order() {
        let store = InMemoryConversationStore::new();
        store.append("s", Message::user("one")).await.unwrap();
        store.append("s", Message::tool("WebSearch", "two")).await.unwrap();
        store.append("s", Message::assistant("three")).await.unwrap();

        let history = store.load("s").await.unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Tool, Role::Assistant]);
        assert_eq!(history[1].tool_name.as_deref(), Some("WebSearch"));
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = InMemoryConversationStore::new();
        assert!(store.load("nobody").await.unwrap().is_empty());
        assert!(store.session_ids().is_empty());
    }

    #[tokio::test]
    async fn load_returns_snapshot() {
        let store = InMemoryConversationStore::new();
        store.append("s", Message::user("a")).await.unwrap();
        let snapshot = store.load("s").await.unwrap();
        store.append("s", Message::user("b")).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.load("s").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_across_sessions() {
        let store = InMemoryConversationStore::new();

        let mut handles = Vec::new();
        for session in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("session-{session}");
                for i in 0..50 {
                    store.append(&id, Message::user(i.to_string())).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.session_ids().len(), 8);
        for session in 0..8 {
            let history = store.load(&format!("session-{session}")).await.unwrap();
            let contents: Vec<String> = history.into_iter().map(|m| m.content).collect();
            let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
            assert_eq!(contents, expected);
        }
    }
}
