use std::sync::Arc;

use axum::{extract::State, response::Response, routing::get, Json, Router};
use intune_agent::{error_response, AgentCatalog};
use intune_core::InterfaceError;
use serde::Serialize;

#[derive(Clone)]
pub struct AgentInfoState {
    catalog: Arc<AgentCatalog>,
    root_agent: Arc<str>,
}

impl AgentInfoState {
    pub fn new(catalog: Arc<AgentCatalog>, root_agent: &str) -> Self {
        Self { catalog, root_agent: Arc::from(root_agent) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub agent_name: String,
    pub description: String,
    pub model: String,
    pub tools: Vec<String>,
}

pub fn router(state: AgentInfoState) -> Router {
    Router::new().route("/agent-info", get(agent_info)).with_state(state)
}

pub async fn agent_info(State(state): State<AgentInfoState>) -> Result<Json<AgentInfo>, Response> {
    let Some(agent) = state.catalog.get(&state.root_agent) else {
        return Err(error_response(InterfaceError::Internal {
            message: format!("root agent `{}` is not in the agent catalog", state.root_agent),
        }));
    };

    Ok(Json(AgentInfo {
        agent_name: agent.name.clone(),
        description: agent.description.clone(),
        model: agent.model.clone(),
        tools: agent.tool_names(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use intune_agent::AgentCatalog;
    use intune_core::domain::agent::{AgentDefinition, ToolDescriptor};

    use super::{agent_info, AgentInfoState};

    fn catalog(tools: &[&str]) -> Arc<AgentCatalog> {
        Arc::new(AgentCatalog::from_definitions([(
            "multi_tool_agent".to_string(),
            AgentDefinition {
                name: "weather_time_agent".to_string(),
                description: "Agent to answer questions about the time and weather in a city."
                    .to_string(),
                model: "gemini-2.0-flash".to_string(),
                instruction: None,
                tools: tools
                    .iter()
                    .map(|name| ToolDescriptor { name: (*name).to_string(), description: None })
                    .collect(),
            },
        )]))
    }

    #[tokio::test]
    async fn agent_info_reports_configured_tools() {
        let state = AgentInfoState::new(
            catalog(&["get_weather", "get_current_time"]),
            "multi_tool_agent",
        );

        let Json(info) = agent_info(State(state)).await.expect("agent info");

        assert_eq!(info.agent_name, "weather_time_agent");
        assert_eq!(info.model, "gemini-2.0-flash");
        assert_eq!(info.tools, vec!["get_weather", "get_current_time"]);
    }

    #[tokio::test]
    async fn tool_count_matches_the_manifest() {
        for count in [0usize, 1, 5] {
            let names: Vec<String> = (0..count).map(|i| format!("tool_{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let state = AgentInfoState::new(catalog(&refs), "multi_tool_agent");

            let Json(info) = agent_info(State(state)).await.expect("agent info");
            assert_eq!(info.tools.len(), count);
        }
    }

    #[tokio::test]
    async fn unknown_root_agent_is_a_server_error() {
        let state = AgentInfoState::new(catalog(&[]), "missing_agent");

        let response = agent_info(State(state)).await.expect_err("missing agent");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
