//! Shared types for the intune agent service: configuration, the feedback
//! record, agent manifests, and the session contract.

pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::agent::{AgentDefinition, ToolDescriptor};
pub use domain::feedback::{FeedbackError, FeedbackRecord, FeedbackSubmission};
pub use domain::session::{Session, SessionError, SessionService, SessionState};
pub use errors::InterfaceError;
