use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use intune_core::domain::session::{Session, SessionError, SessionService, SessionState};

use super::new_session_id;

type SessionKey = (String, String, String);

/// Non-persistent session store. Everything is lost on restart.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

fn key(app_name: &str, user_id: &str, session_id: &str) -> SessionKey {
    (app_name.to_string(), user_id.to_string(), session_id.to_string())
}

#[async_trait]
impl SessionService for InMemorySessionRepository {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<String>,
        state: SessionState,
    ) -> Result<Session, SessionError> {
        let id = session_id.unwrap_or_else(new_session_id);
        let mut sessions = self.sessions.write().await;
        let entry_key = key(app_name, user_id, &id);
        if sessions.contains_key(&entry_key) {
            return Err(SessionError::AlreadyExists { id });
        }

        let session = Session {
            id,
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state,
            last_update_time: Utc::now(),
        };
        sessions.insert(entry_key, session.clone());
        Ok(session)
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&key(app_name, user_id, session_id)).cloned())
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        let mut listed: Vec<Session> = sessions
            .values()
            .filter(|session| session.app_name == app_name && session.user_id == user_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            b.last_update_time.cmp(&a.last_update_time).then_with(|| a.id.cmp(&b.id))
        });
        Ok(listed)
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&key(app_name, user_id, session_id)).is_some())
    }
}
