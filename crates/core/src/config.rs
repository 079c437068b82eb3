use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVICE_NAME: &str = "intune-ai-agent";
pub const SESSION_DB_FILE: &str = "sessions.db";

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub agents: AgentsConfig,
    pub session: SessionConfig,
    pub google: GoogleConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceConfig {
    /// Stamped on every feedback record and used as the application title.
    pub name: String,
    pub description: String,
    /// Name of the logger the feedback sink is bound to.
    pub feedback_logger: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentsConfig {
    pub dir: PathBuf,
    /// App name (directory under `dir`) whose manifest backs `/agent-info`.
    pub root: String,
    pub web: bool,
    pub web_assets_dir: Option<PathBuf>,
    pub allow_origins: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionConfig {
    pub uri: Option<String>,
    pub persist: bool,
    pub base_dir: Option<PathBuf>,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct GoogleConfig {
    pub project: Option<String>,
    pub location: String,
    pub use_vertexai: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub service_name: Option<String>,
    pub agents_dir: Option<PathBuf>,
    pub root_agent: Option<String>,
    pub session_uri: Option<String>,
    pub session_persist: Option<bool>,
    pub session_base_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            service: ServiceConfig {
                name: DEFAULT_SERVICE_NAME.to_string(),
                description: format!("API for interacting with the Agent {DEFAULT_SERVICE_NAME}"),
                feedback_logger: "intune_server.feedback".to_string(),
            },
            agents: AgentsConfig {
                dir: PathBuf::from("agents"),
                root: "multi_tool_agent".to_string(),
                web: false,
                web_assets_dir: None,
                allow_origins: vec!["*".to_string()],
            },
            session: SessionConfig {
                uri: None,
                persist: true,
                base_dir: None,
                max_connections: 5,
                timeout_secs: 30,
            },
            google: GoogleConfig {
                project: None,
                location: "us-central1".to_string(),
                use_vertexai: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Json },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SessionConfig {
    /// Resolves the session-store URI: an explicit URI wins, otherwise a
    /// sqlite file next to the running process. `None` means no persistent
    /// store could be resolved and sessions live in memory.
    pub fn resolve_uri(&self) -> Option<String> {
        if !self.persist {
            return None;
        }
        if let Some(uri) = &self.uri {
            return Some(uri.clone());
        }

        let base_dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => process_base_dir()?,
        };
        Some(colocated_session_uri(&base_dir))
    }
}

pub fn colocated_session_uri(base_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", base_dir.join(SESSION_DB_FILE).display())
}

fn process_base_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("intune.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Root agent manifest directory.
    pub fn root_agent_dir(&self) -> PathBuf {
        self.agents.dir.join(&self.agents.root)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(service) = patch.service {
            if let Some(name) = service.name {
                self.service.name = name;
            }
            if let Some(description) = service.description {
                self.service.description = description;
            }
            if let Some(feedback_logger) = service.feedback_logger {
                self.service.feedback_logger = feedback_logger;
            }
        }

        if let Some(agents) = patch.agents {
            if let Some(dir) = agents.dir {
                self.agents.dir = dir;
            }
            if let Some(root) = agents.root {
                self.agents.root = root;
            }
            if let Some(web) = agents.web {
                self.agents.web = web;
            }
            if let Some(web_assets_dir) = agents.web_assets_dir {
                self.agents.web_assets_dir = Some(web_assets_dir);
            }
            if let Some(allow_origins) = agents.allow_origins {
                self.agents.allow_origins = allow_origins;
            }
        }

        if let Some(session) = patch.session {
            if let Some(uri) = session.uri {
                self.session.uri = Some(uri);
            }
            if let Some(persist) = session.persist {
                self.session.persist = persist;
            }
            if let Some(base_dir) = session.base_dir {
                self.session.base_dir = Some(base_dir);
            }
            if let Some(max_connections) = session.max_connections {
                self.session.max_connections = max_connections;
            }
            if let Some(timeout_secs) = session.timeout_secs {
                self.session.timeout_secs = timeout_secs;
            }
        }

        if let Some(google) = patch.google {
            if let Some(project) = google.project {
                self.google.project = Some(project);
            }
            if let Some(location) = google.location {
                self.google.location = location;
            }
            if let Some(use_vertexai) = google.use_vertexai {
                self.google.use_vertexai = use_vertexai;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INTUNE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // `PORT` is what the hosting platform injects.
        if let Some((key, value)) = read_env_alias(&["INTUNE_SERVER_PORT", "PORT"]) {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("INTUNE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("INTUNE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("INTUNE_SERVICE_NAME") {
            self.service.name = value;
        }
        if let Some(value) = read_env("INTUNE_SERVICE_DESCRIPTION") {
            self.service.description = value;
        }

        if let Some(value) = read_env("INTUNE_AGENTS_DIR") {
            self.agents.dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("INTUNE_ROOT_AGENT") {
            self.agents.root = value;
        }
        if let Some(value) = read_env("INTUNE_AGENTS_WEB") {
            self.agents.web = parse_bool("INTUNE_AGENTS_WEB", &value)?;
        }
        if let Some(value) = read_env("INTUNE_AGENTS_WEB_ASSETS_DIR") {
            self.agents.web_assets_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("INTUNE_ALLOW_ORIGINS") {
            self.agents.allow_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Some(value) = read_env("INTUNE_SESSION_URI") {
            self.session.uri = Some(value);
        }
        if let Some(value) = read_env("INTUNE_SESSION_PERSIST") {
            self.session.persist = parse_bool("INTUNE_SESSION_PERSIST", &value)?;
        }
        if let Some(value) = read_env("INTUNE_SESSION_BASE_DIR") {
            self.session.base_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("INTUNE_SESSION_MAX_CONNECTIONS") {
            self.session.max_connections = parse_u32("INTUNE_SESSION_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("INTUNE_SESSION_TIMEOUT_SECS") {
            self.session.timeout_secs = parse_u64("INTUNE_SESSION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GOOGLE_CLOUD_PROJECT") {
            self.google.project = Some(value);
        }
        if let Some(value) = read_env("GOOGLE_CLOUD_LOCATION") {
            self.google.location = value;
        }
        if let Some(value) = read_env("GOOGLE_GENAI_USE_VERTEXAI") {
            self.google.use_vertexai = parse_bool("GOOGLE_GENAI_USE_VERTEXAI", &value)?;
        }

        let log_level = read_env("INTUNE_LOGGING_LEVEL").or_else(|| read_env("INTUNE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INTUNE_LOGGING_FORMAT").or_else(|| read_env("INTUNE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(service_name) = overrides.service_name {
            self.service.name = service_name;
        }
        if let Some(agents_dir) = overrides.agents_dir {
            self.agents.dir = agents_dir;
        }
        if let Some(root_agent) = overrides.root_agent {
            self.agents.root = root_agent;
        }
        if let Some(session_uri) = overrides.session_uri {
            self.session.uri = Some(session_uri);
        }
        if let Some(session_persist) = overrides.session_persist {
            self.session.persist = session_persist;
        }
        if let Some(session_base_dir) = overrides.session_base_dir {
            self.session.base_dir = Some(session_base_dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_service(&self.service)?;
        validate_agents(&self.agents)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("intune.toml"), PathBuf::from("config/intune.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_service(service: &ServiceConfig) -> Result<(), ConfigError> {
    if service.name.trim().is_empty() {
        return Err(ConfigError::Validation("service.name must not be empty".to_string()));
    }
    if service.feedback_logger.trim().is_empty() {
        return Err(ConfigError::Validation(
            "service.feedback_logger must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_agents(agents: &AgentsConfig) -> Result<(), ConfigError> {
    if agents.root.trim().is_empty() {
        return Err(ConfigError::Validation("agents.root must not be empty".to_string()));
    }

    if agents.allow_origins.is_empty() {
        return Err(ConfigError::Validation(
            "agents.allow_origins must list at least one origin (use `*` for any)".to_string(),
        ));
    }

    if agents.web && agents.web_assets_dir.is_none() {
        return Err(ConfigError::Validation(
            "agents.web is enabled but agents.web_assets_dir is not set".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(uri) = &session.uri {
        let uri = uri.trim();
        let sqlite_url = uri.starts_with("sqlite://") || uri.starts_with("sqlite::");
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "session.uri must be a sqlite URL (`sqlite://...` or `sqlite::...`)".to_string(),
            ));
        }
    }

    if session.max_connections == 0 {
        return Err(ConfigError::Validation(
            "session.max_connections must be greater than zero".to_string(),
        ));
    }

    if session.timeout_secs == 0 || session.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "session.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_alias(keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Accepts `true`/`false` in any case plus `1`/`0`; deployment tooling
/// commonly writes `True`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    service: Option<ServicePatch>,
    agents: Option<AgentsPatch>,
    session: Option<SessionPatch>,
    google: Option<GooglePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicePatch {
    name: Option<String>,
    description: Option<String>,
    feedback_logger: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsPatch {
    dir: Option<PathBuf>,
    root: Option<String>,
    web: Option<bool>,
    web_assets_dir: Option<PathBuf>,
    allow_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    uri: Option<String>,
    persist: Option<bool>,
    base_dir: Option<PathBuf>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GooglePatch {
    project: Option<String>,
    location: Option<String>,
    use_vertexai: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
