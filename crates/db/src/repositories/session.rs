use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;

use intune_core::domain::session::{Session, SessionError, SessionService, SessionState};

use super::new_session_id;
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn storage(error: sqlx::Error) -> SessionError {
    SessionError::Storage(error.to_string())
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, SessionError> {
    let id: String = row.try_get("id").map_err(storage)?;
    let app_name: String = row.try_get("app_name").map_err(storage)?;
    let user_id: String = row.try_get("user_id").map_err(storage)?;
    let state_str: String = row.try_get("state").map_err(storage)?;
    let update_time_str: String = row.try_get("update_time").map_err(storage)?;

    let state = match serde_json::from_str::<Value>(&state_str) {
        Ok(Value::Object(map)) => map,
        _ => return Err(SessionError::CorruptState(state_str)),
    };
    let last_update_time = DateTime::parse_from_rfc3339(&update_time_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| SessionError::Storage(format!("invalid update_time: {error}")))?;

    Ok(Session { id, app_name, user_id, state, last_update_time })
}

#[async_trait]
impl SessionService for SqlSessionRepository {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<String>,
        state: SessionState,
    ) -> Result<Session, SessionError> {
        let id = session_id.unwrap_or_else(new_session_id);
        let now = Utc::now();
        let state_json = Value::Object(state.clone()).to_string();

        let result = sqlx::query(
            "INSERT INTO sessions (app_name, user_id, id, state, create_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(app_name)
        .bind(user_id)
        .bind(&id)
        .bind(&state_json)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Session {
                id,
                app_name: app_name.to_string(),
                user_id: user_id.to_string(),
                state,
                last_update_time: now,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(SessionError::AlreadyExists { id })
            }
            Err(error) => Err(storage(error)),
        }
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query(
            "SELECT id, app_name, user_id, state, update_time FROM sessions
             WHERE app_name = ? AND user_id = ? AND id = ?",
        )
        .bind(app_name)
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let rows = sqlx::query(
            "SELECT id, app_name, user_id, state, update_time FROM sessions
             WHERE app_name = ? AND user_id = ?
             ORDER BY update_time DESC, id ASC",
        )
        .bind(app_name)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_session).collect()
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, SessionError> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE app_name = ? AND user_id = ? AND id = ?")
                .bind(app_name)
                .bind(user_id)
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }
}
