//! Tool agents for QuestWeaver.
//!
//! Agents give the game master the ability to act on the world: recall and
//! store player memories, and run the world clock, weather, factions and
//! events. Bundled agents are compiled in; declarative agents (and, with the
//! `wasm` feature, WASM agents) are fetched from the memory store at
//! discovery time.

pub mod context_memory;
pub mod declarative;
pub mod discovery;
pub mod game_world;
pub mod manage_memory;

#[cfg(feature = "wasm")]
pub mod wasm_tool;

use questweaver_core::identity::UserGuid;
use questweaver_core::memory::ContextKey;
use questweaver_core::tool::ToolArgs;

pub use context_memory::ContextMemoryAgent;
pub use declarative::{AgentManifest, DeclarativeAgent};
pub use discovery::{AgentFactory, BundledSource, Discovery, factory};
pub use game_world::GameWorldAgent;
pub use manage_memory::ManageMemoryAgent;

#[cfg(feature = "wasm")]
pub use wasm_tool::{WasmManifest, WasmPolicy, WasmTool};

/// Pick the document an agent call targets from its `user_guid` argument.
///
/// Absent or empty selects the shared document; anything else must be a
/// valid identifier.
pub(crate) fn context_key_from_args(args: &ToolArgs) -> Result<ContextKey, String> {
    match args.get("user_guid").and_then(|v| v.as_str()).map(str::trim) {
        None | Some("") => Ok(ContextKey::Shared),
        Some(raw) => UserGuid::parse(raw)
            .map(ContextKey::User)
            .ok_or_else(|| format!("Invalid user_guid: {raw}")),
    }
}

/// The standard error payload agents return for bad input. The dispatch loop
/// treats it as a reason to give the model another turn.
pub(crate) fn error_payload(message: impl Into<String>) -> String {
    serde_json::json!({ "error": message.into() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn missing_or_blank_guid_selects_shared() {
        assert_eq!(context_key_from_args(&ToolArgs::new()), Ok(ContextKey::Shared));
        assert_eq!(
            context_key_from_args(&args(json!({"user_guid": ""}))),
            Ok(ContextKey::Shared)
        );
    }

    #[test]
    fn valid_guid_selects_user_document() {
        let key = context_key_from_args(&args(json!({"user_guid": "ABC-123"}))).unwrap();
        assert_eq!(key, ContextKey::User(UserGuid::parse("abc-123").unwrap()));
    }

    #[test]
    fn invalid_guid_rejected() {
        assert!(context_key_from_args(&args(json!({"user_guid": "../x"}))).is_err());
    }
}
