//! Memory store implementations for QuestWeaver.

pub mod file_store;
pub mod in_memory;

pub use file_store::FileStore;
pub use in_memory::InMemoryStore;

use questweaver_config::{AppConfig, StorageBackend};
use questweaver_core::memory::MemoryStore;
use std::sync::Arc;
use tracing::info;

/// Build the store selected by `[storage]`.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn MemoryStore> {
    match config.storage.backend {
        StorageBackend::File => {
            let root = config.storage.resolved_root();
            info!(root = %root.display(), "Using file memory store");
            Arc::new(FileStore::new(root))
        }
        StorageBackend::Memory => {
            info!("Using in-process memory store");
            Arc::new(InMemoryStore::new())
        }
    }
}
