use std::path::PathBuf;
use std::sync::Arc;

use axum::{http::HeaderValue, Router};
use intune_core::domain::session::SessionService;
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;

use crate::catalog::{AgentCatalog, CatalogError};
use crate::routes::{self, FrameworkState};
use crate::sessions::open_session_service;

const DEV_UI_PATH: &str = "/dev-ui";

#[derive(Clone, Debug)]
pub struct AppOptions {
    pub agents_dir: PathBuf,
    pub web: bool,
    pub web_assets_dir: Option<PathBuf>,
    pub allow_origins: Vec<String>,
    pub session_service_uri: Option<String>,
    pub session_max_connections: u32,
    pub session_timeout_secs: u64,
}

impl AppOptions {
    /// Headless defaults: no web UI, any origin, in-memory sessions.
    pub fn new(agents_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            web: false,
            web_assets_dir: None,
            allow_origins: vec!["*".to_string()],
            session_service_uri: None,
            session_max_connections: 5,
            session_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppBuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("unsupported session service URI `{0}` (expected sqlite)")]
    UnsupportedSessionUri(String),
    #[error("session store connection failed: {0}")]
    SessionConnect(#[source] sqlx::Error),
    #[error("session store migration failed: {0}")]
    SessionMigrate(#[source] sqlx::migrate::MigrateError),
    #[error("web UI requested but no assets directory is configured")]
    MissingWebAssets,
    #[error("web UI assets directory `{0}` does not exist")]
    WebAssetsNotFound(PathBuf),
    #[error("invalid CORS origin `{0}`")]
    InvalidOrigin(String),
}

/// The framework application the front door extends with its own routes.
pub struct AgentApplication {
    pub title: String,
    pub description: String,
    catalog: Arc<AgentCatalog>,
    sessions: Arc<dyn SessionService>,
    cors: CorsLayer,
    web_assets_dir: Option<PathBuf>,
}

pub async fn build_app(options: AppOptions) -> Result<AgentApplication, AppBuildError> {
    let catalog = AgentCatalog::load(&options.agents_dir)?;
    info!(
        event_name = "agent.app.catalog_loaded",
        agents_dir = %options.agents_dir.display(),
        agent_count = catalog.len(),
        "agent catalog loaded"
    );

    let web_assets_dir = if options.web {
        let dir = options.web_assets_dir.clone().ok_or(AppBuildError::MissingWebAssets)?;
        if !dir.is_dir() {
            return Err(AppBuildError::WebAssetsNotFound(dir));
        }
        Some(dir)
    } else {
        None
    };

    let cors = cors_layer(&options.allow_origins)?;
    let sessions = open_session_service(
        options.session_service_uri.as_deref(),
        options.session_max_connections,
        options.session_timeout_secs,
    )
    .await?;

    Ok(AgentApplication {
        title: "agent-app".to_string(),
        description: String::new(),
        catalog: Arc::new(catalog),
        sessions,
        cors,
        web_assets_dir,
    })
}

fn cors_layer(allow_origins: &[String]) -> Result<CorsLayer, AppBuildError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allow_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| AppBuildError::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

impl AgentApplication {
    pub fn catalog(&self) -> Arc<AgentCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn sessions(&self) -> Arc<dyn SessionService> {
        Arc::clone(&self.sessions)
    }

    /// Combines the framework routes with `extra` and applies the app-wide
    /// CORS policy to both.
    pub fn into_router(self, extra: Router) -> Router {
        let mut router = routes::router(FrameworkState {
            catalog: self.catalog,
            sessions: self.sessions,
        })
        .merge(extra);

        if let Some(dir) = self.web_assets_dir {
            router = router.nest_service(DEV_UI_PATH, ServeDir::new(dir));
        }

        router.layer(self.cors)
    }
}
