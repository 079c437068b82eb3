use std::sync::Arc;

use intune_core::domain::session::SessionService;
use intune_db::{connect_with_settings, migrations, InMemorySessionRepository, SqlSessionRepository};
use tracing::info;

use crate::app::AppBuildError;

/// Opens the session service for `uri`. `None` selects the in-memory store.
pub async fn open_session_service(
    uri: Option<&str>,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<Arc<dyn SessionService>, AppBuildError> {
    let Some(uri) = uri else {
        info!(event_name = "agent.sessions.in_memory", "in-memory session store selected");
        return Ok(Arc::new(InMemorySessionRepository::default()));
    };

    if !uri.starts_with("sqlite:") {
        return Err(AppBuildError::UnsupportedSessionUri(uri.to_string()));
    }

    let pool = connect_with_settings(uri, max_connections, timeout_secs)
        .await
        .map_err(AppBuildError::SessionConnect)?;
    migrations::run_pending(&pool).await.map_err(AppBuildError::SessionMigrate)?;

    info!(
        event_name = "agent.sessions.sqlite",
        session_uri = %redact_query(uri),
        "session store opened"
    );
    Ok(Arc::new(SqlSessionRepository::new(pool)))
}

fn redact_query(uri: &str) -> &str {
    uri.split_once('?').map(|(base, _)| base).unwrap_or(uri)
}
