//! Tool trait: the abstraction over tool agents.
//!
//! Tool agents are what let the game master act on the world: recall and
//! store memories, advance the world clock, generate quests. The model picks
//! one by name and the dispatch loop invokes it with a key-value map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Arguments passed to a tool agent. Always a JSON object.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Names of agents that always receive the active user identity, whether or
/// not they advertise it through [`Tool::user_scoped`].
pub const IDENTITY_SENSITIVE_TOOLS: &[&str] = &[
    "ManageMemory",
    "ContextMemory",
    "GameWorld",
    "GameWorldAgent",
    "NPCDialogue",
    "NPCDialogueAgent",
    "QuestGenerator",
    "QuestGeneratorAgent",
    "CombatNarrator",
    "CombatNarratorAgent",
    "LootMasterAgent",
    "StoryProgressionAgent",
    "RandomEventAgent",
];

/// The core Tool trait.
///
/// Bundled agents, declarative manifest agents and WASM agents all implement
/// this. The registry checks conformance when an agent is registered.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this agent (e.g., "GameWorld").
    fn name(&self) -> &str;

    /// A description of what this agent does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this agent's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this agent reads or writes per-user state and therefore needs
    /// the active identity injected as `user_guid`.
    fn user_scoped(&self) -> bool {
        false
    }

    /// Execute the agent. `Ok(None)` is a successful completion with no
    /// output.
    async fn execute(&self, arguments: ToolArgs) -> std::result::Result<Option<String>, ToolError>;

    /// Convert this agent into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Does `tool` need the active identity injected?
pub fn is_identity_sensitive(tool: &dyn Tool) -> bool {
    tool.user_scoped() || IDENTITY_SENSITIVE_TOOLS.contains(&tool.name())
}

#[derive(Clone)]
struct Registered {
    tool: Arc<dyn Tool>,
    origin: String,
}

/// A registry of available tool agents, keyed by name.
///
/// The dispatch loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up the agent the LLM selects
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Registered>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent built in-process.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        self.register_from(tool, "in-process")
    }

    /// Register an agent, recording where it came from. A later registration
    /// under the same name replaces the earlier one.
    pub fn register_from(
        &mut self,
        tool: Box<dyn Tool>,
        origin: &str,
    ) -> std::result::Result<(), ToolError> {
        validate(tool.as_ref())?;
        let name = tool.name().to_string();
        if let Some(previous) = self.tools.get(&name) {
            warn!(
                tool = %name,
                replaced = %previous.origin,
                by = %origin,
                "Duplicate tool name, later registration wins"
            );
        }
        self.tools.insert(
            name,
            Registered {
                tool: Arc::from(tool),
                origin: origin.to_string(),
            },
        );
        Ok(())
    }

    /// Get an agent by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|r| r.tool.as_ref())
    }

    /// Where the agent registered under `name` was loaded from.
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|r| r.origin.as_str())
    }

    /// All tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|r| r.tool.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// All registered agent names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn validate(tool: &dyn Tool) -> std::result::Result<(), ToolError> {
    let name = tool.name();
    if name.trim().is_empty() {
        return Err(ToolError::InvalidDefinition("tool name is empty".into()));
    }
    if name.chars().any(|c| c.is_whitespace()) {
        return Err(ToolError::InvalidDefinition(format!(
            "tool name '{name}' contains whitespace"
        )));
    }
    if !tool.parameters_schema().is_object() {
        return Err(ToolError::InvalidDefinition(format!(
            "parameter schema of '{name}' is not a JSON object"
        )));
    }
    Ok(())
}
