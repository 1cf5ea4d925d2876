//! ContextMemory: recall what has been stored about a player.

use async_trait::async_trait;
use questweaver_core::error::ToolError;
use questweaver_core::memory::MemoryStore;
use questweaver_core::tool::{Tool, ToolArgs};
use serde_json::Value;
use std::sync::Arc;

use crate::{context_key_from_args, error_payload};

/// How many entries a recall without keywords returns.
const RECENT_LIMIT: usize = 5;

pub struct ContextMemoryAgent {
    store: Arc<dyn MemoryStore>,
}

impl ContextMemoryAgent {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ContextMemoryAgent {
    fn name(&self) -> &str {
        "ContextMemory"
    }

    fn description(&self) -> &str {
        "Recalls stored memories about the player: past choices, preferences, \
         relationships and open tasks. Pass keywords to search, or full_recall to \
         list everything."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Words to search for in content and tags"
                },
                "full_recall": {
                    "type": "boolean",
                    "description": "Return every stored memory"
                },
                "user_guid": {
                    "type": "string",
                    "description": "Player whose memories are recalled"
                }
            }
        })
    }

    fn user_scoped(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Option<String>, ToolError> {
        let key = match context_key_from_args(&arguments) {
            Ok(key) => key,
            Err(e) => return Ok(Some(error_payload(e))),
        };

        let document = self.store.read(&key).await?;
        let memories: Vec<&Value> = document
            .get("memories")
            .and_then(|m| m.as_array())
            .map(|list| list.iter().collect())
            .unwrap_or_default();

        if memories.is_empty() {
            return Ok(Some("No memories stored yet.".to_string()));
        }

        let full_recall = arguments
            .get("full_recall")
            .map(|v| v.as_bool().unwrap_or_else(|| v.as_str() == Some("true")))
            .unwrap_or(false);
        let keywords = keywords_from(arguments.get("keywords"));

        let selected: Vec<&Value> = if full_recall {
            memories
        } else if !keywords.is_empty() {
            memories
                .into_iter()
                .filter(|m| matches_keywords(m, &keywords))
                .collect()
        } else {
            let skip = memories.len().saturating_sub(RECENT_LIMIT);
            memories.into_iter().skip(skip).collect()
        };

        if selected.is_empty() {
            return Ok(Some(format!(
                "No memories matched: {}",
                keywords.join(" ")
            )));
        }

        let lines: Vec<String> = selected.iter().map(|m| render(m)).collect();
        Ok(Some(lines.join("\n")))
    }
}

/// Keywords arrive as a list, but a single space separated string is
/// accepted too.
fn keywords_from(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .flat_map(str::split_whitespace)
            .map(str::to_lowercase)
            .collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_lowercase).collect(),
        _ => Vec::new(),
    }
}

fn matches_keywords(memory: &Value, keywords: &[String]) -> bool {
    let content = memory
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_lowercase();
    let tags: Vec<String> = memory
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|t| t.iter().filter_map(|x| x.as_str()).map(str::to_lowercase).collect())
        .unwrap_or_default();

    keywords
        .iter()
        .any(|k| content.contains(k.as_str()) || tags.iter().any(|t| t.contains(k.as_str())))
}

fn render(memory: &Value) -> String {
    let field = |name: &str| memory.get(name).and_then(|v| v.as_str()).unwrap_or("");
    let importance = memory.get("importance").and_then(|v| v.as_u64()).unwrap_or(3);
    let mut line = format!(
        "[{}] {} (importance {importance}, {} {})",
        field("memory_type"),
        field("content"),
        field("date"),
        field("time"),
    );
    if let Some(tags) = memory.get("tags").and_then(|t| t.as_array())
        && !tags.is_empty()
    {
        let tags: Vec<&str> = tags.iter().filter_map(|t| t.as_str()).collect();
        line.push_str(&format!(" tags: {}", tags.join(", ")));
    }
    line
}
