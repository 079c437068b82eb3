use intune_agent::AgentCatalog;
use intune_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct CatalogEntry {
    app_name: String,
    agent_name: String,
    model: String,
    root: bool,
    tools: Vec<String>,
}

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "catalog",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match AgentCatalog::load(&config.agents.dir) {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("catalog", "agent_catalog", error.to_string(), 4);
        }
    };

    let entries: Vec<CatalogEntry> = catalog
        .iter()
        .map(|(app_name, definition)| CatalogEntry {
            app_name: app_name.clone(),
            agent_name: definition.name.clone(),
            model: definition.model.clone(),
            root: *app_name == config.agents.root,
            tools: definition.tool_names(),
        })
        .collect();

    CommandResult::success_with(
        "catalog",
        format!("{} agent app(s) in `{}`", entries.len(), config.agents.dir.display()),
        Some(entries),
    )
}
