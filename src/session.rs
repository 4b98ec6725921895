use crate::conversation::Conversation;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

pub type SharedConversation = Arc<AsyncMutex<Conversation>>;

struct SessionEntry {
    conversation: SharedConversation,
    last_used: DateTime<Utc>,
}

/// Conversation state keyed by session id.
///
/// Each session's conversation sits behind its own async mutex, so prompts
/// within one session run one after another while separate sessions never
/// see each other's turns.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: ChronoDuration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX),
        }
    }

    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Returns the conversation for `session_id`, creating it if needed, and
    /// drops sessions idle for longer than the TTL.
    pub fn checkout(&self, session_id: &str) -> SharedConversation {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|id, entry| {
            id == session_id || now.signed_duration_since(entry.last_used) <= ttl
        });
        if sessions.len() != before {
            debug!("Pruned {} idle sessions", before - sessions.len());
        }

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                conversation: Arc::new(AsyncMutex::new(Conversation::new())),
                last_used: now,
            });
        entry.last_used = now;
        Arc::clone(&entry.conversation)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.checkout("a");
        let b = store.checkout("b");
        a.lock().await.push_user_text("hello from a");

        assert_eq!(a.lock().await.len(), 1);
        assert!(b.lock().await.is_empty());
        assert!(Arc::ptr_eq(&a, &store.checkout("a")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn idle_sessions_are_pruned() {
        let store = SessionStore::new(Duration::from_secs(0));
        store.checkout("old");
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut("old").unwrap().last_used = Utc::now() - ChronoDuration::seconds(5);
        }
        store.checkout("new");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionStore::new_session_id(), SessionStore::new_session_id());
    }
}
