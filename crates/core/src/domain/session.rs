use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type SessionState = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: SessionState,
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session `{id}` already exists")]
    AlreadyExists { id: String },
    #[error("session storage failure: {0}")]
    Storage(String),
    #[error("stored session state is not a JSON object: {0}")]
    CorruptState(String),
}

/// Persistence contract for conversation sessions. Implementations must be
/// safe to share across request handlers.
#[async_trait]
pub trait SessionService: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<String>,
        state: SessionState,
    ) -> Result<Session, SessionError>;

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>, SessionError>;

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionError>;

    /// Returns `false` when no such session existed.
    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, SessionError>;
}
