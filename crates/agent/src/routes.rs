//! Framework routes:
//! - `GET    /list-apps`
//! - `GET    /apps/{app_name}/users/{user_id}/sessions`
//! - `POST   /apps/{app_name}/users/{user_id}/sessions`
//! - `GET    /apps/{app_name}/users/{user_id}/sessions/{session_id}`
//! - `POST   /apps/{app_name}/users/{user_id}/sessions/{session_id}`
//! - `DELETE /apps/{app_name}/users/{user_id}/sessions/{session_id}`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use intune_core::{
    domain::session::{Session, SessionService, SessionState},
    InterfaceError,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog::AgentCatalog;

#[derive(Clone)]
pub struct FrameworkState {
    pub catalog: Arc<AgentCatalog>,
    pub sessions: Arc<dyn SessionService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    state: Option<SessionState>,
    #[serde(default)]
    session_id: Option<String>,
}

pub fn error_response(error: InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(event_name = "agent.request.failed", error = %error, "request failed");
    }
    (status, Json(ErrorBody { detail: error.detail() })).into_response()
}

pub fn router(state: FrameworkState) -> Router {
    Router::new()
        .route("/list-apps", get(list_apps))
        .route(
            "/apps/{app_name}/users/{user_id}/sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/apps/{app_name}/users/{user_id}/sessions/{session_id}",
            get(get_session).post(create_session_with_id).delete(delete_session),
        )
        .with_state(state)
}

async fn list_apps(State(state): State<FrameworkState>) -> Json<Vec<String>> {
    Json(state.catalog.app_names())
}

fn ensure_app(state: &FrameworkState, app_name: &str) -> Result<(), Response> {
    if state.catalog.contains(app_name) {
        Ok(())
    } else {
        Err(error_response(InterfaceError::NotFound {
            message: format!("agent app `{app_name}` not found"),
        }))
    }
}

fn parse_create_request(body: &Bytes) -> Result<CreateSessionRequest, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateSessionRequest::default());
    }
    serde_json::from_slice(body).map_err(|error| {
        error_response(InterfaceError::Unprocessable {
            message: format!("invalid session request: {error}"),
        })
    })
}

async fn list_sessions(
    State(state): State<FrameworkState>,
    Path((app_name, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<Session>>, Response> {
    ensure_app(&state, &app_name)?;
    state
        .sessions
        .list_sessions(&app_name, &user_id)
        .await
        .map(Json)
        .map_err(|error| error_response(error.into()))
}

async fn create_session(
    State(state): State<FrameworkState>,
    Path((app_name, user_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Session>, Response> {
    let request = parse_create_request(&body)?;
    insert_session(&state, &app_name, &user_id, request.session_id, request.state).await
}

async fn create_session_with_id(
    State(state): State<FrameworkState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<Session>, Response> {
    let request = parse_create_request(&body)?;
    insert_session(&state, &app_name, &user_id, Some(session_id), request.state).await
}

async fn insert_session(
    state: &FrameworkState,
    app_name: &str,
    user_id: &str,
    session_id: Option<String>,
    session_state: Option<SessionState>,
) -> Result<Json<Session>, Response> {
    ensure_app(state, app_name)?;
    let session = state
        .sessions
        .create_session(app_name, user_id, session_id, session_state.unwrap_or_default())
        .await
        .map_err(|error| error_response(error.into()))?;

    info!(
        event_name = "agent.session.created",
        app_name = %session.app_name,
        user_id = %session.user_id,
        session_id = %session.id,
        backend = state.sessions.backend(),
        "session created"
    );
    Ok(Json(session))
}

async fn get_session(
    State(state): State<FrameworkState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Result<Json<Session>, Response> {
    ensure_app(&state, &app_name)?;
    match state.sessions.get_session(&app_name, &user_id, &session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(session_not_found(&session_id)),
        Err(error) => Err(error_response(error.into())),
    }
}

async fn delete_session(
    State(state): State<FrameworkState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Result<StatusCode, Response> {
    ensure_app(&state, &app_name)?;
    match state.sessions.delete_session(&app_name, &user_id, &session_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(session_not_found(&session_id)),
        Err(error) => Err(error_response(error.into())),
    }
}

fn session_not_found(session_id: &str) -> Response {
    error_response(InterfaceError::NotFound {
        message: format!("session `{session_id}` not found"),
    })
}
