use std::sync::Arc;

use axum::Router;
use intune_agent::{build_app, AgentApplication, AgentCatalog, AppBuildError, AppOptions};
use intune_core::config::AppConfig;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent_info::{self, AgentInfoState};
use crate::feedback::{self, FeedbackSink, FeedbackState};
use crate::health;

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
    pub session_backend: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("agent application could not be constructed: {0}")]
    AgentApp(#[from] AppBuildError),
}

/// Runs the startup sequence after configuration and logging are in place:
/// resolve the session store, build the agent application, stamp its
/// metadata, and mount the front-door routes.
pub async fn bootstrap_with_config(
    config: AppConfig,
    feedback_sink: Arc<dyn FeedbackSink>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        agents_dir = %config.agents.dir.display(),
        "starting application bootstrap"
    );

    let session_service_uri = config.session.resolve_uri();
    if session_service_uri.is_none() {
        warn!(
            event_name = "system.bootstrap.session_uri_missing",
            correlation_id = "bootstrap",
            "session service URI not provided; using in-memory session service instead, \
             all sessions will be lost when the server restarts"
        );
    }

    let mut app = build_app(AppOptions {
        agents_dir: config.agents.dir.clone(),
        web: config.agents.web,
        web_assets_dir: config.agents.web_assets_dir.clone(),
        allow_origins: config.agents.allow_origins.clone(),
        session_service_uri,
        session_max_connections: config.session.max_connections,
        session_timeout_secs: config.session.timeout_secs,
    })
    .await?;

    app.title = config.service.name.clone();
    app.description = config.service.description.clone();

    let session_backend = app.sessions().backend();
    info!(
        event_name = "system.bootstrap.agent_app_ready",
        correlation_id = "bootstrap",
        title = %app.title,
        description = %app.description,
        session_backend,
        agent_count = app.catalog().len(),
        "agent application constructed"
    );

    let catalog = app.catalog();
    if !catalog.contains(&config.agents.root) {
        warn!(
            event_name = "system.bootstrap.root_agent_missing",
            correlation_id = "bootstrap",
            root_agent = %config.agents.root,
            "root agent is not in the catalog; /agent-info will fail"
        );
    }

    let router = mount(app, front_door_routes(&config, feedback_sink, catalog));

    Ok(Application { config, router, session_backend })
}

fn front_door_routes(
    config: &AppConfig,
    feedback_sink: Arc<dyn FeedbackSink>,
    catalog: Arc<AgentCatalog>,
) -> Router {
    Router::new()
        .merge(feedback::router(FeedbackState::new(feedback_sink, &config.service.name)))
        .merge(health::router())
        .merge(agent_info::router(AgentInfoState::new(catalog, &config.agents.root)))
}

fn mount(app: AgentApplication, routes: Router) -> Router {
    app.into_router(routes).layer(TraceLayer::new_for_http())
}
