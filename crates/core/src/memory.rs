//! Memory store trait: one JSON document per context key.
//!
//! Two kinds of key exist: the shared (world/lore) document visible to every
//! player, and one personal document per user identity. Every operation names
//! its key explicitly, so a shared read can never be served from a user
//! document or the other way round.
//!
//! The store also exposes two artifact namespaces (`agents`, `multi_agents`)
//! from which runtime-loaded tool agents are fetched during discovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MemoryError;
use crate::identity::UserGuid;

/// Which document an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "guid")]
pub enum ContextKey {
    /// Global world state shared by all users
    Shared,
    /// One user's personal history
    User(UserGuid),
}

impl ContextKey {
    /// Key for an optional identity; `None` selects the shared document.
    pub fn for_user(guid: Option<&UserGuid>) -> Self {
        match guid {
            Some(g) => ContextKey::User(g.clone()),
            None => ContextKey::Shared,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ContextKey::Shared)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKey::Shared => f.write_str("shared"),
            ContextKey::User(g) => write!(f, "user:{g}"),
        }
    }
}

/// Artifact namespace holding runtime-loaded agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactNamespace {
    Agents,
    MultiAgents,
}

impl ArtifactNamespace {
    /// Namespaces in discovery order.
    pub const ALL: [ArtifactNamespace; 2] = [ArtifactNamespace::Agents, ArtifactNamespace::MultiAgents];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactNamespace::Agents => "agents",
            ArtifactNamespace::MultiAgents => "multi_agents",
        }
    }
}

/// Key-value JSON document storage.
///
/// Implementations: file system (one file per key), in-process map.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// A human-readable backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Read the document for `key`. A missing document is an empty object,
    /// never an error.
    async fn read(&self, key: &ContextKey) -> Result<serde_json::Value, MemoryError>;

    /// Replace the document for `key`.
    async fn write(&self, key: &ContextKey, document: &serde_json::Value) -> Result<(), MemoryError>;

    /// Artifact file names in a namespace, sorted. Empty if the namespace
    /// does not exist.
    async fn list_artifacts(&self, namespace: ArtifactNamespace) -> Result<Vec<String>, MemoryError>;

    /// Raw bytes of one artifact, or `None` if it does not exist.
    async fn read_artifact(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Vec<u8>>, MemoryError>;

    /// Health check: is the backing storage reachable?
    async fn health_check(&self) -> Result<bool, MemoryError> {
        Ok(true)
    }
}

/// Reject artifact names that could escape their namespace.
pub fn validate_artifact_name(name: &str) -> Result<(), MemoryError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(MemoryError::InvalidArtifact(name.to_string()));
    }
    Ok(())
}
