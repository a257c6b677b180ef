use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use aerolens_core::{ConversationState, SessionId};

/// Per-session conversation state for the process lifetime. The outer map
/// lock is held only to fetch the per-session handle, so independent
/// sessions proceed concurrently while turns within one session serialize.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session(&self, session_id: &SessionId) -> Arc<Mutex<ConversationState>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(session_id.clone()))))
            .clone()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
