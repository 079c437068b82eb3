use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_IMAGE: &str =
    "us-central1-docker.pkg.dev/data-engineering-ai-472818/cloud-run-ai/intuneai-api:latest";

pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_REGION: &str = "GOOGLE_CLOUD_LOCATION";
pub const ENV_USE_VERTEXAI: &str = "GOOGLE_GENAI_USE_VERTEXAI";
pub const ENV_IMAGE: &str = "INTUNE_IMAGE";
pub const ENV_INVOKERS: &str = "INTUNE_INVOKERS";

pub const PUBLIC_MEMBER: &str = "allUsers";
const MEMBER_PREFIXES: [&str; 4] = ["user:", "serviceAccount:", "group:", "domain:"];

/// Deployment shape. Each variant builds on the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Basic,
    Scaled,
    Storage,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Scaled => "scaled",
            Self::Storage => "storage",
        }
    }
}

/// Who may invoke the deployed service. There is no default: public access
/// has to be asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokerAccess {
    Public,
    Members(Vec<String>),
}

impl InvokerAccess {
    /// Parses a comma-separated member list. `allUsers` on its own selects
    /// public access.
    pub fn from_list(raw: &str) -> Result<Self, StackError> {
        let members: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|member| !member.is_empty())
            .map(ToString::to_string)
            .collect();

        match members.as_slice() {
            [] => Err(StackError::MissingInvokers),
            [only] if only == PUBLIC_MEMBER => Ok(Self::Public),
            _ => Ok(Self::Members(members)),
        }
    }

    /// Sorted, de-duplicated IAM members.
    pub fn members(&self) -> Vec<String> {
        let mut members = match self {
            Self::Public => vec![PUBLIC_MEMBER.to_string()],
            Self::Members(members) => members.clone(),
        };
        members.sort();
        members.dedup();
        members
    }

    pub fn is_public(&self) -> bool {
        self.members().iter().any(|member| member == PUBLIC_MEMBER)
    }

    fn validate(&self) -> Result<(), StackError> {
        let members = self.members();
        if members.is_empty() {
            return Err(StackError::MissingInvokers);
        }
        for member in members {
            let known = member == PUBLIC_MEMBER
                || member == "allAuthenticatedUsers"
                || MEMBER_PREFIXES
                    .iter()
                    .any(|prefix| member.len() > prefix.len() && member.starts_with(prefix));
            if !known {
                return Err(StackError::InvalidInvoker(member));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct StackOverrides {
    pub project: Option<String>,
    pub region: Option<String>,
    pub image: Option<String>,
    pub use_vertexai: Option<bool>,
    pub invokers: Option<InvokerAccess>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackConfig {
    pub project: Option<String>,
    pub region: String,
    pub image: String,
    pub use_vertexai: bool,
    pub invokers: InvokerAccess,
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error("no invoker configured (pass --public or --invoker, or set INTUNE_INVOKERS)")]
    MissingInvokers,
    #[error("invalid invoker member `{0}`")]
    InvalidInvoker(String),
    #[error("`{field}` must not be empty")]
    EmptyValue { field: &'static str },
    #[error("invalid boolean for {key}: `{value}`")]
    InvalidBool { key: &'static str, value: String },
    #[error("the `{variant}` variant requires a project (GOOGLE_CLOUD_PROJECT or --project)")]
    MissingProject { variant: &'static str },
    #[error("failed to render stack: {0}")]
    Render(#[from] serde_json::Error),
}

impl StackConfig {
    pub fn resolve(overrides: StackOverrides) -> Result<Self, StackError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolves each setting as override, then environment, then fallback.
    pub fn resolve_with(
        overrides: StackOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StackError> {
        let lookup = |key: &str| {
            env(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
        };

        let project =
            overrides.project.or_else(|| lookup(ENV_PROJECT)).filter(|p| !p.is_empty());
        let region = overrides
            .region
            .or_else(|| lookup(ENV_REGION))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let image = overrides
            .image
            .or_else(|| lookup(ENV_IMAGE))
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
        let use_vertexai = match overrides.use_vertexai {
            Some(value) => value,
            None => match lookup(ENV_USE_VERTEXAI) {
                Some(raw) => parse_bool(ENV_USE_VERTEXAI, &raw)?,
                None => true,
            },
        };
        let invokers = match overrides.invokers {
            Some(access) => access,
            None => InvokerAccess::from_list(&lookup(ENV_INVOKERS).unwrap_or_default())?,
        };

        let config = Self { project, region, image, use_vertexai, invokers };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StackError> {
        if self.region.trim().is_empty() {
            return Err(StackError::EmptyValue { field: "region" });
        }
        if self.image.trim().is_empty() {
            return Err(StackError::EmptyValue { field: "image" });
        }
        self.invokers.validate()
    }

    pub fn require_project(&self, variant: Variant) -> Result<&str, StackError> {
        self.project.as_deref().ok_or(StackError::MissingProject { variant: variant.as_str() })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, StackError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(StackError::InvalidBool { key, value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        InvokerAccess, StackConfig, StackError, StackOverrides, Variant, DEFAULT_IMAGE,
        DEFAULT_REGION,
    };

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_invoker_choice_is_rejected() {
        let result = StackConfig::resolve_with(StackOverrides::default(), env(&[]));
        assert!(matches!(result, Err(StackError::MissingInvokers)));
    }

    #[test]
    fn fallbacks_apply_once_invokers_are_chosen() {
        let config = StackConfig::resolve_with(
            StackOverrides { invokers: Some(InvokerAccess::Public), ..StackOverrides::default() },
            env(&[]),
        )
        .expect("config resolves");

        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert!(config.use_vertexai);
        assert_eq!(config.project, None);
        assert!(config.invokers.is_public());
    }

    #[test]
    fn blank_environment_values_fall_back_to_defaults() {
        let config = StackConfig::resolve_with(
            StackOverrides::default(),
            env(&[
                ("GOOGLE_CLOUD_PROJECT", ""),
                ("GOOGLE_CLOUD_LOCATION", ""),
                ("INTUNE_IMAGE", "  "),
                ("GOOGLE_GENAI_USE_VERTEXAI", " "),
                ("INTUNE_INVOKERS", "allUsers"),
            ]),
        )
        .expect("blank values are treated as unset");

        assert_eq!(config.project, None);
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert!(config.use_vertexai);
    }

    #[test]
    fn overrides_beat_environment_beat_fallbacks() {
        let vars = env(&[
            ("GOOGLE_CLOUD_PROJECT", "env-project"),
            ("GOOGLE_CLOUD_LOCATION", "europe-west1"),
            ("INTUNE_IMAGE", "env/image:1"),
            ("INTUNE_INVOKERS", "user:ops@example.com"),
        ]);
        let config = StackConfig::resolve_with(
            StackOverrides {
                project: Some("flag-project".to_string()),
                ..StackOverrides::default()
            },
            vars,
        )
        .expect("config resolves");

        assert_eq!(config.project.as_deref(), Some("flag-project"));
        assert_eq!(config.region, "europe-west1");
        assert_eq!(config.image, "env/image:1");
        assert_eq!(config.invokers.members(), vec!["user:ops@example.com".to_string()]);
        assert!(!config.invokers.is_public());
    }

    #[test]
    fn vertex_flag_from_environment_is_parsed() {
        let config = StackConfig::resolve_with(
            StackOverrides { invokers: Some(InvokerAccess::Public), ..StackOverrides::default() },
            env(&[("GOOGLE_GENAI_USE_VERTEXAI", "FALSE")]),
        )
        .expect("config resolves");
        assert!(!config.use_vertexai);

        let result = StackConfig::resolve_with(
            StackOverrides { invokers: Some(InvokerAccess::Public), ..StackOverrides::default() },
            env(&[("GOOGLE_GENAI_USE_VERTEXAI", "maybe")]),
        );
        assert!(matches!(result, Err(StackError::InvalidBool { .. })));
    }

    #[test]
    fn invoker_list_parsing() {
        assert_eq!(InvokerAccess::from_list(" allUsers ").expect("public"), InvokerAccess::Public);
        assert!(matches!(InvokerAccess::from_list(" , "), Err(StackError::MissingInvokers)));

        let access =
            InvokerAccess::from_list("user:b@example.com,user:a@example.com,user:b@example.com")
                .expect("members");
        assert_eq!(
            access.members(),
            vec!["user:a@example.com".to_string(), "user:b@example.com".to_string()]
        );
    }

    #[test]
    fn unknown_invoker_member_is_rejected() {
        let result = StackConfig::resolve_with(
            StackOverrides {
                invokers: Some(InvokerAccess::Members(vec!["ops@example.com".to_string()])),
                ..StackOverrides::default()
            },
            env(&[]),
        );
        assert!(matches!(
            result,
            Err(StackError::InvalidInvoker(member)) if member == "ops@example.com"
        ));
    }

    #[test]
    fn storage_variant_requires_a_project() {
        let config = StackConfig::resolve_with(
            StackOverrides { invokers: Some(InvokerAccess::Public), ..StackOverrides::default() },
            env(&[]),
        )
        .expect("config resolves");
        assert!(matches!(
            config.require_project(Variant::Storage),
            Err(StackError::MissingProject { variant: "storage" })
        ));
    }
}
