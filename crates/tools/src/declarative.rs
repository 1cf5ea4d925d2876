//! Declarative agents loaded from `_agent.json` manifests.
//!
//! A manifest describes the agent to the model and carries a response
//! template. Executing the agent fills `{{key}}` placeholders from the call
//! arguments:
//!
//! ```json
//! {
//!   "name": "QuestGenerator",
//!   "description": "Creates a quest hook for the current scene",
//!   "parameters": {"type": "object", "properties": {"theme": {"type": "string"}}},
//!   "user_scoped": false,
//!   "template": "{\"event\":\"quest_offer\",\"theme\":\"{{theme}}\"}"
//! }
//! ```

use async_trait::async_trait;
use questweaver_core::error::ToolError;
use questweaver_core::tool::{Tool, ToolArgs};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// File suffix that marks a declarative agent manifest.
pub const MANIFEST_SUFFIX: &str = "_agent.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentManifest {
    pub name: String,
    pub description: String,
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default)]
    pub user_scoped: bool,
    /// Output template. An empty template completes with no output.
    #[serde(default)]
    pub template: String,
}

fn default_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// An agent whose behavior is entirely described by its manifest.
#[derive(Debug, Clone)]
pub struct DeclarativeAgent {
    manifest: AgentManifest,
}

impl DeclarativeAgent {
    pub fn new(manifest: AgentManifest) -> Self {
        Self { manifest }
    }

    /// Parse a manifest from raw bytes.
    pub fn from_slice(source_name: &str, bytes: &[u8]) -> Result<Self, ToolError> {
        let manifest: AgentManifest =
            serde_json::from_slice(bytes).map_err(|e| ToolError::LoadFailed {
                source_name: source_name.to_string(),
                reason: format!("Invalid agent manifest: {e}"),
            })?;
        Ok(Self::new(manifest))
    }

    /// Load a manifest that has been materialized on disk.
    pub async fn load(path: &Path) -> Result<Self, ToolError> {
        let source_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("manifest")
            .to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| ToolError::LoadFailed {
            source_name: source_name.clone(),
            reason: format!("Failed to read manifest: {e}"),
        })?;
        Self::from_slice(&source_name, &bytes)
    }

    pub fn manifest(&self) -> &AgentManifest {
        &self.manifest
    }
}

#[async_trait]
impl Tool for DeclarativeAgent {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> Value {
        self.manifest.parameters.clone()
    }

    fn user_scoped(&self) -> bool {
        self.manifest.user_scoped
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Option<String>, ToolError> {
        if self.manifest.template.is_empty() {
            return Ok(None);
        }
        Ok(Some(render_template(&self.manifest.template, &arguments)))
    }
}

/// Replace every `{{key}}` with the matching argument. An unclosed `{{` is
/// left as-is.
///
/// Templates that start with `{` or `[` are JSON documents and the output
/// stays valid JSON: inside a string literal the value is escaped as string
/// content, elsewhere it is inserted as a JSON value and unknown keys become
/// `null`. Any other template is prose: strings go in verbatim, other values
/// as JSON, and unknown keys as nothing.
pub fn render_template(template: &str, arguments: &ToolArgs) -> String {
    let json_shaped = template.trim_start().starts_with(['{', '[']);
    let mut scanner = StringScanner::default();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let literal = &rest[..start];
        out.push_str(literal);
        scanner.feed(literal);

        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let value = arguments.get(after[..end].trim());
        match (json_shaped, scanner.in_string) {
            (true, true) => out.push_str(&escape_string_content(value)),
            (true, false) => out.push_str(&value.unwrap_or(&Value::Null).to_string()),
            (false, _) => match value {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => {}
            },
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// The value as the body of a JSON string literal, without the quotes.
fn escape_string_content(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let quoted = Value::String(text).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Tracks whether the template text seen so far ends inside a JSON string.
#[derive(Default)]
struct StringScanner {
    in_string: bool,
    escaped: bool,
}

impl StringScanner {
    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            if self.escaped {
                self.escaped = false;
            } else if self.in_string && c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = !self.in_string;
            }
        }
    }
}
