use serde::{Deserialize, Serialize};

/// Statically declared agent: identity, model, and the ordered list of tools
/// it can call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model: String,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl AgentDefinition {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    /// Checks the manifest invariants: non-empty name and model, non-empty
    /// and unique tool names.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("agent name must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err(format!("agent `{}` has an empty model", self.name));
        }

        let mut seen = std::collections::BTreeSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(format!("agent `{}` declares a tool with an empty name", self.name));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(format!(
                    "agent `{}` declares tool `{}` more than once",
                    self.name, tool.name
                ));
            }
        }

        Ok(())
    }
}
