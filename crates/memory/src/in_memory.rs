//! In-memory store: useful for testing and ephemeral sessions.
//!
//! Supports failure injection so callers can exercise degraded paths
//! (snapshot placeholders, discovery with an unreachable store).

use async_trait::async_trait;
use questweaver_core::error::MemoryError;
use questweaver_core::memory::{ArtifactNamespace, ContextKey, MemoryStore, validate_artifact_name};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// An in-process store holding documents and artifacts in maps.
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<ContextKey, Value>>,
    artifacts: RwLock<HashMap<ArtifactNamespace, BTreeMap<String, Vec<u8>>>>,
    offline: AtomicBool,
    failing_keys: RwLock<HashSet<ContextKey>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact to a namespace.
    pub async fn put_artifact(&self, namespace: ArtifactNamespace, name: &str, bytes: impl Into<Vec<u8>>) {
        self.artifacts
            .write()
            .await
            .entry(namespace)
            .or_default()
            .insert(name.to_string(), bytes.into());
    }

    /// Make every operation fail with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make reads and writes of one key fail with `Unavailable`.
    pub async fn fail_key(&self, key: ContextKey) {
        self.failing_keys.write().await.insert(key);
    }

    fn check_online(&self) -> Result<(), MemoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }

    async fn check_key(&self, key: &ContextKey) -> Result<(), MemoryError> {
        self.check_online()?;
        if self.failing_keys.read().await.contains(key) {
            return Err(MemoryError::Unavailable(format!("{key} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: &ContextKey) -> Result<Value, MemoryError> {
        self.check_key(key).await?;
        Ok(self
            .documents
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }

    async fn write(&self, key: &ContextKey, document: &Value) -> Result<(), MemoryError> {
        self.check_key(key).await?;
        self.documents.write().await.insert(key.clone(), document.clone());
        Ok(())
    }

    async fn list_artifacts(&self, namespace: ArtifactNamespace) -> Result<Vec<String>, MemoryError> {
        self.check_online()?;
        Ok(self
            .artifacts
            .read()
            .await
            .get(&namespace)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_artifact(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Vec<u8>>, MemoryError> {
        self.check_online()?;
        validate_artifact_name(name)?;
        Ok(self
            .artifacts
            .read()
            .await
            .get(&namespace)
            .and_then(|files| files.get(name).cloned()))
    }

    async fn health_check(&self) -> Result<bool, MemoryError> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questweaver_core::identity::UserGuid;
    use serde_json::json;

    #[tokio::test]
    async fn keys_are_isolated() {
        let store = InMemoryStore::new();
        let user = ContextKey::User(UserGuid::fallback());
        store.write(&ContextKey::Shared, &json!({"a": 1})).await.unwrap();

        assert_eq!(store.read(&ContextKey::Shared).await.unwrap(), json!({"a": 1}));
        assert_eq!(store.read(&user).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn offline_fails_everything() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(store.read(&ContextKey::Shared).await.is_err());
        assert!(store.list_artifacts(ArtifactNamespace::Agents).await.is_err());
        assert!(!store.health_check().await.unwrap());

        store.set_offline(false);
        assert!(store.read(&ContextKey::Shared).await.is_ok());
    }

    #[tokio::test]
    async fn failing_key_only_affects_that_key() {
        let store = InMemoryStore::new();
        let user = ContextKey::User(UserGuid::fallback());
        store.fail_key(user.clone()).await;

        assert!(matches!(store.read(&user).await, Err(MemoryError::Unavailable(_))));
        assert!(store.read(&ContextKey::Shared).await.is_ok());
    }

    #[tokio::test]
    async fn artifacts_sorted_by_name() {
        let store = InMemoryStore::new();
        store.put_artifact(ArtifactNamespace::MultiAgents, "b_agent.json", "{}").await;
        store.put_artifact(ArtifactNamespace::MultiAgents, "a_agent.json", "{}").await;

        let names = store.list_artifacts(ArtifactNamespace::MultiAgents).await.unwrap();
        assert_eq!(names, vec!["a_agent.json", "b_agent.json"]);
        assert!(store.list_artifacts(ArtifactNamespace::Agents).await.unwrap().is_empty());
    }
}
