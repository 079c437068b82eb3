//! Delegated agent application.
//!
//! This crate is the boundary between the HTTP front door and the agent
//! framework. It owns:
//! - the agent catalog, loaded from static `agent.toml` manifests
//!   (see `catalog`)
//! - session service selection by URI, sqlite or in-memory (see `sessions`)
//! - the framework route set: app listing and session CRUD (see `routes`)
//! - the application builder the front door mounts its own routes onto
//!   (see `app`)
//!
//! Agent reasoning itself (model calls, tool execution) is not implemented
//! here.

pub mod app;
pub mod catalog;
pub mod routes;
pub mod sessions;

pub use app::{build_app, AgentApplication, AppBuildError, AppOptions};
pub use catalog::{AgentCatalog, CatalogError, MANIFEST_FILE};
pub use routes::{error_response, ErrorBody};
