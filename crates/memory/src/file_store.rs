//! File-based memory store: one JSON document per context key.
//!
//! Layout under the root directory:
//!
//! ```text
//! shared/memory.json          world state and lore
//! users/<guid>/memory.json    one player's journey
//! agents/<file>               runtime-loaded agent artifacts
//! multi_agents/<file>
//! ```
//!
//! Documents are re-read on every call. Nothing is cached in-process, so two
//! processes sharing a root see each other's writes on the next turn.

use async_trait::async_trait;
use questweaver_core::error::MemoryError;
use questweaver_core::memory::{ArtifactNamespace, ContextKey, MemoryStore, validate_artifact_name};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const DOCUMENT_FILE: &str = "memory.json";

/// A directory-backed store.
pub struct FileStore {
    root: PathBuf,
    // serializes writers within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "File memory store opened");
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `key`.
    pub fn document_path(&self, key: &ContextKey) -> PathBuf {
        match key {
            ContextKey::Shared => self.root.join("shared").join(DOCUMENT_FILE),
            ContextKey::User(guid) => self.root.join("users").join(guid.as_str()).join(DOCUMENT_FILE),
        }
    }

    fn namespace_dir(&self, namespace: ArtifactNamespace) -> PathBuf {
        self.root.join(namespace.as_str())
    }

    /// Store an artifact so discovery can find it. Used by `init` and tests.
    pub async fn put_artifact(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), MemoryError> {
        validate_artifact_name(name)?;
        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to create {}: {e}", dir.display())))?;
        tokio::fs::write(dir.join(name), bytes)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write artifact {name}: {e}")))
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self, key: &ContextKey) -> Result<Value, MemoryError> {
        let path = self.document_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(empty_document()),
            Err(e) => {
                return Err(MemoryError::Unavailable(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(empty_document());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupted memory document, treating as empty");
                Ok(empty_document())
            }
        }
    }

    async fn write(&self, key: &ContextKey, document: &Value) -> Result<(), MemoryError> {
        let path = self.document_path(key);
        let body = serde_json::to_string_pretty(document)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize document: {e}")))?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        // write-then-rename; readers see the old or the new document
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MemoryError::Storage(format!("Failed to write memory file: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MemoryError::Storage(format!("Failed to replace memory file: {e}")));
        }

        debug!(key = %key, "Memory document written");
        Ok(())
    }

    async fn list_artifacts(&self, namespace: ArtifactNamespace) -> Result<Vec<String>, MemoryError> {
        let dir = self.namespace_dir(namespace);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::Unavailable(format!(
                    "Failed to list {}: {e}",
                    dir.display()
                )));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_artifact(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Vec<u8>>, MemoryError> {
        validate_artifact_name(name)?;
        let path = self.namespace_dir(namespace).join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::Unavailable(format!(
                "Failed to read artifact {name}: {e}"
            ))),
        }
    }

    async fn health_check(&self) -> Result<bool, MemoryError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) => Ok(meta.is_dir()),
            // a fresh root is created on first write
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(MemoryError::Unavailable(e.to_string())),
        }
    }
}

fn empty_document() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use questweaver_core::identity::UserGuid;
    use serde_json::json;

    fn player() -> ContextKey {
        ContextKey::User(UserGuid::parse("123e4567-e89b-12d3-a456-426614174000").unwrap())
    }

    #[tokio::test]
    async fn missing_document_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.read(&ContextKey::Shared).await.unwrap(), json!({}));
        assert_eq!(store.read(&player()).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn write_then_read_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .write(&ContextKey::Shared, &json!({"lore": "The kingdom of Eldoria"}))
            .await
            .unwrap();
        store
            .write(&player(), &json!({"journey": "left the village"}))
            .await
            .unwrap();

        let shared = store.read(&ContextKey::Shared).await.unwrap();
        let user = store.read(&player()).await.unwrap();
        assert_eq!(shared["lore"], "The kingdom of Eldoria");
        assert!(shared.get("journey").is_none());
        assert_eq!(user["journey"], "left the village");
        assert!(user.get("lore").is_none());

        assert!(dir.path().join("shared/memory.json").exists());
        assert!(
            dir.path()
                .join("users/123e4567-e89b-12d3-a456-426614174000/memory.json")
                .exists()
        );
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path());
            store.write(&player(), &json!({"gold": 12})).await.unwrap();
        }
        let store = FileStore::new(dir.path());
        assert_eq!(store.read(&player()).await.unwrap()["gold"], 12);
    }

    #[tokio::test]
    async fn failed_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.document_path(&ContextKey::Shared);
        // a non-empty directory where the document belongs makes the rename fail
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = store.write(&ContextKey::Shared, &json!({"lore": "lost"})).await;
        assert!(matches!(err, Err(MemoryError::Storage(_))));

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(DOCUMENT_FILE)]);
    }

    #[tokio::test]
    async fn corrupted_document_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.document_path(&ContextKey::Shared);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(store.read(&ContextKey::Shared).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn artifacts_listed_sorted_and_missing_namespace_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.list_artifacts(ArtifactNamespace::Agents).await.unwrap().is_empty());

        store
            .put_artifact(ArtifactNamespace::Agents, "quest_agent.json", b"{}")
            .await
            .unwrap();
        store
            .put_artifact(ArtifactNamespace::Agents, "loot_agent.json", b"{}")
            .await
            .unwrap();

        let names = store.list_artifacts(ArtifactNamespace::Agents).await.unwrap();
        assert_eq!(names, vec!["loot_agent.json", "quest_agent.json"]);
        assert!(store.list_artifacts(ArtifactNamespace::MultiAgents).await.unwrap().is_empty());

        let bytes = store
            .read_artifact(ArtifactNamespace::Agents, "loot_agent.json")
            .await
            .unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"{}"[..]));
        assert!(
            store
                .read_artifact(ArtifactNamespace::Agents, "missing.json")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn artifact_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store
            .read_artifact(ArtifactNamespace::Agents, "../shared/memory.json")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArtifact(_)));
    }
}
