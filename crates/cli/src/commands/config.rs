use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use intune_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::Value as JsonValue;
use toml::Value;

use crate::commands::CommandResult;

/// Config key paths and the environment variables that can set them, in
/// lookup order.
const FIELDS: &[(&str, &[&str])] = &[
    ("server.bind_address", &["INTUNE_SERVER_BIND_ADDRESS"]),
    ("server.port", &["INTUNE_SERVER_PORT", "PORT"]),
    ("server.graceful_shutdown_secs", &["INTUNE_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("service.name", &["INTUNE_SERVICE_NAME"]),
    ("service.description", &["INTUNE_SERVICE_DESCRIPTION"]),
    ("service.feedback_logger", &[]),
    ("agents.dir", &["INTUNE_AGENTS_DIR"]),
    ("agents.root", &["INTUNE_ROOT_AGENT"]),
    ("agents.web", &["INTUNE_AGENTS_WEB"]),
    ("agents.web_assets_dir", &["INTUNE_AGENTS_WEB_ASSETS_DIR"]),
    ("agents.allow_origins", &["INTUNE_ALLOW_ORIGINS"]),
    ("session.uri", &["INTUNE_SESSION_URI"]),
    ("session.persist", &["INTUNE_SESSION_PERSIST"]),
    ("session.base_dir", &["INTUNE_SESSION_BASE_DIR"]),
    ("session.max_connections", &["INTUNE_SESSION_MAX_CONNECTIONS"]),
    ("session.timeout_secs", &["INTUNE_SESSION_TIMEOUT_SECS"]),
    ("google.project", &["GOOGLE_CLOUD_PROJECT"]),
    ("google.location", &["GOOGLE_CLOUD_LOCATION"]),
    ("google.use_vertexai", &["GOOGLE_GENAI_USE_VERTEXAI"]),
    ("logging.level", &["INTUNE_LOGGING_LEVEL", "INTUNE_LOG_LEVEL"]),
    ("logging.format", &["INTUNE_LOGGING_FORMAT", "INTUNE_LOG_FORMAT"]),
];

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    source_precedence: &'static str,
    config_file: Option<String>,
    fields: Vec<ConfigField>,
}

#[derive(Debug, Serialize)]
struct ConfigField {
    key: String,
    value: JsonValue,
    source: String,
}

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let rendered = match serde_json::to_value(&config) {
        Ok(rendered) => rendered,
        Err(error) => {
            return CommandResult::failure("config", "serialization", error.to_string(), 3);
        }
    };

    let mut fields: Vec<ConfigField> = FIELDS
        .iter()
        .map(|(key_path, env_keys)| ConfigField {
            key: (*key_path).to_string(),
            value: lookup(&rendered, key_path).cloned().unwrap_or(JsonValue::Null),
            source: field_source(
                key_path,
                env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect();

    fields.push(ConfigField {
        key: "session.effective_uri".to_string(),
        value: match config.session.resolve_uri() {
            Some(uri) => JsonValue::String(uri),
            None => JsonValue::String("<in-memory>".to_string()),
        },
        source: "derived".to_string(),
    });

    let effective = EffectiveConfig {
        source_precedence: "env > file > default",
        config_file: config_file_path.map(|path| path.display().to_string()),
        fields,
    };
    CommandResult::success_with("config", "effective configuration", Some(effective))
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("intune.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/intune.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn lookup<'a>(root: &'a JsonValue, key_path: &str) -> Option<&'a JsonValue> {
    key_path.split('.').try_fold(root, |current, key| current.get(key))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{contains_path, lookup};

    #[test]
    fn nested_paths_resolve_in_both_documents() {
        let doc: toml::Value = "[session]\npersist = false\n".parse().expect("toml");
        assert!(contains_path(&doc, "session.persist"));
        assert!(!contains_path(&doc, "session.uri"));

        let rendered = json!({"server": {"port": 8080}});
        assert_eq!(lookup(&rendered, "server.port"), Some(&json!(8080)));
        assert_eq!(lookup(&rendered, "server.missing"), None);
    }
}
