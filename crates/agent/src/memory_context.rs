//! Memory snapshots embedded in the system prompt.
//!
//! Two snapshots are taken per identity: the shared world document and the
//! user's own document. Each is read under its own key, rendered as compact
//! JSON and cut to a character budget. Storage failures never block a turn;
//! the affected snapshot becomes a placeholder.

use questweaver_core::identity::UserGuid;
use questweaver_core::memory::{ContextKey, MemoryStore};
use serde_json::Value;
use tracing::{debug, warn};

pub const NO_SHARED_MEMORY: &str = "No shared context memory available.";
pub const NO_USER_MEMORY: &str = "No specific context memory available.";
pub const MEMORY_INIT_FAILED: &str = "Context memory initialization failed.";

/// The two snapshots for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContext {
    pub shared: String,
    pub specific: String,
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self {
            shared: NO_SHARED_MEMORY.to_string(),
            specific: NO_USER_MEMORY.to_string(),
        }
    }
}

impl MemoryContext {
    /// Read both documents for `user`. Shared first, then the user's own.
    pub async fn load(store: &dyn MemoryStore, user: &UserGuid, budget: usize) -> Self {
        let shared = snapshot(store, &ContextKey::Shared, NO_SHARED_MEMORY, budget).await;
        let specific = snapshot(store, &ContextKey::User(user.clone()), NO_USER_MEMORY, budget).await;
        debug!(
            user_guid = %user,
            shared_chars = shared.chars().count(),
            specific_chars = specific.chars().count(),
            "Memory context loaded"
        );
        Self { shared, specific }
    }
}

async fn snapshot(store: &dyn MemoryStore, key: &ContextKey, empty: &str, budget: usize) -> String {
    match store.read(key).await {
        Ok(document) => render(&document, empty, budget),
        Err(e) => {
            warn!(key = %key, error = %e, "Memory snapshot unavailable");
            MEMORY_INIT_FAILED.to_string()
        }
    }
}

fn render(document: &Value, empty: &str, budget: usize) -> String {
    let is_empty = match document {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if is_empty {
        return empty.to_string();
    }
    truncate_chars(&document.to_string(), budget)
}

/// Cut `text` to at most `budget` characters without splitting a character.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questweaver_memory::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn empty_store_gives_placeholders() {
        let store = InMemoryStore::new();
        let ctx = MemoryContext::load(&store, &UserGuid::fallback(), 5000).await;
        assert_eq!(ctx, MemoryContext::default());
    }

    #[tokio::test]
    async fn documents_read_under_their_own_keys() {
        let store = InMemoryStore::new();
        let user = UserGuid::parse("player-7").unwrap();
        store.write(&ContextKey::Shared, &json!({"lore": "dragons"})).await.unwrap();
        store
            .write(&ContextKey::User(user.clone()), &json!({"memories": ["saved the mayor"]}))
            .await
            .unwrap();

        let ctx = MemoryContext::load(&store, &user, 5000).await;
        assert_eq!(ctx.shared, r#"{"lore":"dragons"}"#);
        assert_eq!(ctx.specific, r#"{"memories":["saved the mayor"]}"#);

        let other = MemoryContext::load(&store, &UserGuid::fallback(), 5000).await;
        assert_eq!(other.shared, r#"{"lore":"dragons"}"#);
        assert_eq!(other.specific, NO_USER_MEMORY);
    }

    #[tokio::test]
    async fn failures_become_placeholder_per_snapshot() {
        let store = InMemoryStore::new();
        let user = UserGuid::parse("player-7").unwrap();
        store.write(&ContextKey::Shared, &json!({"lore": "dragons"})).await.unwrap();
        store.fail_key(ContextKey::User(user.clone())).await;

        let ctx = MemoryContext::load(&store, &user, 5000).await;
        assert_eq!(ctx.shared, r#"{"lore":"dragons"}"#);
        assert_eq!(ctx.specific, MEMORY_INIT_FAILED);

        store.set_offline(true);
        let ctx = MemoryContext::load(&store, &user, 5000).await;
        assert_eq!(ctx.shared, MEMORY_INIT_FAILED);
    }

    #[tokio::test]
    async fn snapshot_truncated_to_budget() {
        let store = InMemoryStore::new();
        store
            .write(&ContextKey::Shared, &json!({"lore": "é".repeat(100)}))
            .await
            .unwrap();
        let ctx = MemoryContext::load(&store, &UserGuid::fallback(), 20).await;
        assert_eq!(ctx.shared.chars().count(), 20);
        assert!(ctx.shared.starts_with(r#"{"lore":"é"#));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
