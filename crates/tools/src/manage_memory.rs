//! ManageMemory: store a fact, preference, insight or task about a player.
//!
//! Entries are appended to the `memories` array of the player's document
//! (or the shared document when no identity is supplied).

use async_trait::async_trait;
use chrono::Utc;
use questweaver_core::error::ToolError;
use questweaver_core::memory::MemoryStore;
use questweaver_core::tool::{Tool, ToolArgs};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{context_key_from_args, error_payload};

pub const MEMORY_TYPES: &[&str] = &["fact", "preference", "insight", "task"];

/// One stored memory, as written to the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub memory_type: String,
    pub content: String,
    pub importance: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    pub date: String,
    pub time: String,
}

pub struct ManageMemoryAgent {
    store: Arc<dyn MemoryStore>,
}

impl ManageMemoryAgent {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ManageMemoryAgent {
    fn name(&self) -> &str {
        "ManageMemory"
    }

    fn description(&self) -> &str {
        "Stores something worth remembering about the player or the world: a fact, \
         a preference, an insight, or a task. Use it when the player reveals choices, \
         relationships, or goals that should persist across sessions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_type": {
                    "type": "string",
                    "enum": MEMORY_TYPES,
                    "description": "Kind of memory being stored"
                },
                "content": {
                    "type": "string",
                    "description": "What to remember"
                },
                "importance": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 5,
                    "description": "How important this memory is (default 3)"
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Keywords to find this memory again"
                },
                "user_guid": {
                    "type": "string",
                    "description": "Player whose memory is updated"
                }
            },
            "required": ["memory_type", "content"]
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

        let content = arguments
            .get("content")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        if content.is_empty() {
            return Ok(Some(error_payload("No content provided for memory storage")));
        }

        let memory_type = arguments
            .get("memory_type")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("fact")
            .to_ascii_lowercase();
        if !MEMORY_TYPES.contains(&memory_type.as_str()) {
            return Ok(Some(error_payload(format!(
                "Unknown memory_type '{memory_type}'"
            ))));
        }

        let importance = arguments
            .get("importance")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(3)
            .clamp(1, 5) as u8;

        let tags: Vec<String> = arguments
            .get("tags")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default();

        let now = Utc::now();
        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            memory_type: memory_type.clone(),
            content: content.to_string(),
            importance,
            tags,
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
        };

        let mut document = self.store.read(&key).await?;
        if !document.is_object() {
            document = serde_json::json!({});
        }
        let entry = serde_json::to_value(&record).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        match document.get_mut("memories").and_then(|m| m.as_array_mut()) {
            Some(list) => list.push(entry),
            None => document["memories"] = serde_json::Value::Array(vec![entry]),
        }
        self.store.write(&key, &document).await?;

        debug!(key = %key, memory_type = %memory_type, "Memory stored");
        Ok(Some(
            serde_json::json!({
                "status": "success",
                "id": record.id,
                "message": format!("Stored {memory_type}: {content}"),
            })
            .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questweaver_core::identity::UserGuid;
    use questweaver_core::memory::ContextKey;
    use questweaver_memory::InMemoryStore;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn appends_to_user_document() {
        let store = Arc::new(InMemoryStore::new());
        let agent = ManageMemoryAgent::new(store.clone());

        let out = agent
            .execute(args(json!({
                "memory_type": "preference",
                "content": "Prefers stealth over combat",
                "importance": 9,
                "tags": ["playstyle"],
                "user_guid": "123e4567-e89b-12d3-a456-426614174000"
            })))
            .await
            .unwrap()
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(reply["status"], "success");

        agent
            .execute(args(json!({
                "memory_type": "fact",
                "content": "Owns a grey horse",
                "user_guid": "123e4567-e89b-12d3-a456-426614174000"
            })))
            .await
            .unwrap();

        let key = ContextKey::User(UserGuid::parse("123e4567-e89b-12d3-a456-426614174000").unwrap());
        let doc = store.read(&key).await.unwrap();
        let memories = doc["memories"].as_array().unwrap();
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0]["importance"], 5);
        assert_eq!(memories[0]["tags"][0], "playstyle");
        assert_eq!(memories[1]["memory_type"], "fact");

        // shared document untouched
        assert_eq!(store.read(&ContextKey::Shared).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn empty_content_is_error_payload() {
        let agent = ManageMemoryAgent::new(Arc::new(InMemoryStore::new()));
        let out = agent
            .execute(args(json!({"memory_type": "fact", "content": "  "})))
            .await
            .unwrap()
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(reply["error"].as_str().unwrap().contains("No content"));
    }

    #[tokio::test]
    async fn unknown_type_is_error_payload() {
        let agent = ManageMemoryAgent::new(Arc::new(InMemoryStore::new()));
        let out = agent
            .execute(args(json!({"memory_type": "rumor", "content": "x"})))
            .await
            .unwrap()
            .unwrap();
        assert!(out.contains("rumor"));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(InMemoryStore::new());
        store.set_offline(true);
        let agent = ManageMemoryAgent::new(store);
        let result = agent
            .execute(args(json!({"memory_type": "fact", "content": "x"})))
            .await;
        assert!(result.is_err());
    }
}
