use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use intune_core::domain::agent::AgentDefinition;
use thiserror::Error;
use tracing::debug;

pub const MANIFEST_FILE: &str = "agent.toml";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("agents directory `{0}` does not exist or is not a directory")]
    MissingDirectory(PathBuf),
    #[error("could not read `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse agent manifest `{path}`: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid agent manifest `{path}`: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Agents keyed by app name (the directory holding the manifest).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentCatalog {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentCatalog {
    /// Loads every `<dir>/<app>/agent.toml`. Subdirectories without a
    /// manifest are skipped; a malformed manifest fails the whole load.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        if !dir.is_dir() {
            return Err(CatalogError::MissingDirectory(dir.to_path_buf()));
        }

        let entries = fs::read_dir(dir)
            .map_err(|source| CatalogError::Read { path: dir.to_path_buf(), source })?;

        let mut agents = BTreeMap::new();
        for entry in entries {
            let entry =
                entry.map_err(|source| CatalogError::Read { path: dir.to_path_buf(), source })?;
            let app_dir = entry.path();
            if !app_dir.is_dir() {
                continue;
            }

            let manifest = app_dir.join(MANIFEST_FILE);
            if !manifest.is_file() {
                debug!(
                    event_name = "agent.catalog.skip",
                    path = %app_dir.display(),
                    "directory has no agent manifest"
                );
                continue;
            }

            let Some(app_name) = app_dir.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            agents.insert(app_name.to_string(), read_manifest(&manifest)?);
        }

        Ok(Self { agents })
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = (String, AgentDefinition)>,
    ) -> Self {
        Self { agents: definitions.into_iter().collect() }
    }

    pub fn get(&self, app_name: &str) -> Option<&AgentDefinition> {
        self.agents.get(app_name)
    }

    pub fn contains(&self, app_name: &str) -> bool {
        self.agents.contains_key(app_name)
    }

    /// App names in sorted order.
    pub fn app_names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AgentDefinition)> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn read_manifest(path: &Path) -> Result<AgentDefinition, CatalogError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
    let definition = toml::from_str::<AgentDefinition>(&raw)
        .map_err(|source| CatalogError::Parse { path: path.to_path_buf(), source })?;
    definition
        .check()
        .map_err(|message| CatalogError::Invalid { path: path.to_path_buf(), message })?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{AgentCatalog, CatalogError, MANIFEST_FILE};

    const WEATHER_AGENT: &str = r#"
name = "weather_time_agent"
description = "Agent to answer questions about the time and weather in a city."
model = "gemini-2.0-flash"

[[tools]]
name = "get_weather"

[[tools]]
name = "get_current_time"
description = "Returns the current time in a specified city."
"#;

    fn write_agent(dir: &TempDir, app: &str, manifest: &str) {
        let app_dir = dir.path().join(app);
        fs::create_dir_all(&app_dir).expect("create app dir");
        fs::write(app_dir.join(MANIFEST_FILE), manifest).expect("write manifest");
    }

    #[test]
    fn loads_manifests_keyed_by_directory() {
        let dir = TempDir::new().expect("tempdir");
        write_agent(&dir, "multi_tool_agent", WEATHER_AGENT);
        fs::create_dir_all(dir.path().join("__pycache__")).expect("stray dir");
        fs::write(dir.path().join("README.md"), "not an agent").expect("stray file");

        let catalog = AgentCatalog::load(dir.path()).expect("catalog should load");

        assert_eq!(catalog.app_names(), vec!["multi_tool_agent"]);
        let agent = catalog.get("multi_tool_agent").expect("agent");
        assert_eq!(agent.name, "weather_time_agent");
        assert_eq!(agent.tool_names(), vec!["get_weather", "get_current_time"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let error = AgentCatalog::load(&dir.path().join("nope")).expect_err("missing dir");
        assert!(matches!(error, CatalogError::MissingDirectory(_)));
    }

    #[test]
    fn malformed_manifest_fails_the_load() {
        let dir = TempDir::new().expect("tempdir");
        write_agent(&dir, "good", WEATHER_AGENT);
        write_agent(&dir, "broken", "name = \"x\"\nmodel = ");

        let error = AgentCatalog::load(dir.path()).expect_err("parse failure");
        assert!(matches!(error, CatalogError::Parse { .. }));
    }

    #[test]
    fn manifest_invariants_are_enforced() {
        let dir = TempDir::new().expect("tempdir");
        write_agent(
            &dir,
            "dup",
            "name = \"a\"\nmodel = \"m\"\n[[tools]]\nname = \"t\"\n[[tools]]\nname = \"t\"\n",
        );

        let error = AgentCatalog::load(dir.path()).expect_err("duplicate tools");
        assert!(matches!(error, CatalogError::Invalid { ref message, .. } if message.contains("t")));
    }

    #[test]
    fn empty_directory_yields_empty_catalog() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = AgentCatalog::load(dir.path()).expect("empty catalog");
        assert!(catalog.is_empty());
    }
}
