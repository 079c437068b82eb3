//! Deployment declarations for the InTuneAI agent service: a Cloud Run
//! service, its invoker policy and an optional artifacts bucket, rendered
//! as a Pulumi YAML program.

pub mod config;
pub mod render;
pub mod resources;
pub mod variants;

pub use config::{InvokerAccess, StackConfig, StackError, StackOverrides, Variant};
pub use render::{render, Program};
pub use variants::{declare, Stack};
