//! Tool discovery: build a fresh registry from every available source.
//!
//! Sources are visited in a fixed order: bundled agents first, then the
//! `agents` artifact namespace, then `multi_agents`. Later registrations win
//! on a name clash. A candidate that fails to load is logged and skipped;
//! discovery itself never fails.
//!
//! Each artifact is copied into its own scratch directory before it is
//! loaded. The directory is a [`tempfile::TempDir`] guard, so it is removed
//! however the load ends.

use questweaver_core::error::ToolError;
use questweaver_core::memory::{ArtifactNamespace, MemoryStore};
use questweaver_core::tool::{Tool, ToolRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::context_memory::ContextMemoryAgent;
use crate::declarative::{DeclarativeAgent, MANIFEST_SUFFIX};
use crate::game_world::GameWorldAgent;
use crate::manage_memory::ManageMemoryAgent;

#[cfg(feature = "wasm")]
use crate::wasm_tool::{WasmManifest, WasmPolicy, WasmTool};

/// Suffix of WASM manifests. Recognized even without the `wasm` feature so
/// they can be reported instead of silently ignored.
const WASM_SUFFIX: &str = "_agent.tool.json";

/// Builds one bundled agent.
pub type AgentFactory = Box<dyn Fn() -> Result<Box<dyn Tool>, ToolError> + Send + Sync>;

/// Wrap an infallible constructor as an [`AgentFactory`].
pub fn factory<T>(build: impl Fn() -> T + Send + Sync + 'static) -> AgentFactory
where
    T: Tool + 'static,
{
    Box::new(move || Ok(Box::new(build()) as Box<dyn Tool>))
}

/// An in-process agent source.
pub struct BundledSource {
    name: String,
    factory: AgentFactory,
}

impl BundledSource {
    pub fn new(name: impl Into<String>, factory: AgentFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Discovers tool agents from bundled sources and the memory store.
pub struct Discovery {
    store: Arc<dyn MemoryStore>,
    scratch_root: PathBuf,
    bundled: Vec<BundledSource>,
    #[cfg(feature = "wasm")]
    wasm_policy: WasmPolicy,
}

impl Discovery {
    pub fn new(store: Arc<dyn MemoryStore>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            scratch_root: scratch_root.into(),
            bundled: Vec::new(),
            #[cfg(feature = "wasm")]
            wasm_policy: WasmPolicy::default(),
        }
    }

    /// Add a bundled source. Sources load in the order they are added.
    pub fn with_bundled(mut self, source: BundledSource) -> Self {
        self.bundled.push(source);
        self
    }

    /// Add ContextMemory, ManageMemory and GameWorld, all backed by the
    /// discovery store.
    pub fn with_default_agents(self) -> Self {
        let recall = self.store.clone();
        let manage = self.store.clone();
        let world = self.store.clone();
        self.with_bundled(BundledSource::new(
            "ContextMemory",
            factory(move || ContextMemoryAgent::new(recall.clone())),
        ))
        .with_bundled(BundledSource::new(
            "ManageMemory",
            factory(move || ManageMemoryAgent::new(manage.clone())),
        ))
        .with_bundled(BundledSource::new(
            "GameWorld",
            factory(move || GameWorldAgent::new(world.clone())),
        ))
    }

    #[cfg(feature = "wasm")]
    pub fn with_wasm_policy(mut self, policy: WasmPolicy) -> Self {
        self.wasm_policy = policy;
        self
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Build a registry from every source.
    pub async fn discover(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();

        for source in &self.bundled {
            let origin = format!("bundled:{}", source.name);
            match (source.factory)() {
                Ok(tool) => register(&mut registry, tool, &origin),
                Err(e) => error!(source = %origin, error = %e, "Failed to build bundled agent"),
            }
        }

        for namespace in ArtifactNamespace::ALL {
            let names = match self.store.list_artifacts(namespace).await {
                Ok(names) => names,
                Err(e) => {
                    error!(
                        namespace = namespace.as_str(),
                        error = %e,
                        "Failed to list agent artifacts"
                    );
                    continue;
                }
            };

            for name in names {
                if !is_candidate(&name) {
                    continue;
                }
                let origin = format!("{}/{name}", namespace.as_str());
                match self.load_artifact(namespace, &name).await {
                    Ok(Some(tool)) => register(&mut registry, tool, &origin),
                    Ok(None) => {}
                    Err(e) => error!(source = %origin, error = %e, "Failed to load agent"),
                }
            }
        }

        info!(count = registry.len(), tools = ?registry.names(), "Tool discovery complete");
        registry
    }

    /// Load one artifact through a scratch directory. `Ok(None)` means the
    /// artifact was recognized but cannot be loaded in this build.
    async fn load_artifact(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Box<dyn Tool>>, ToolError> {
        if name.ends_with(WASM_SUFFIX) {
            return self.load_wasm(namespace, name).await;
        }

        let scratch = self.scratch_dir(name)?;
        let (path, _) = self.materialize(scratch.path(), namespace, name).await?;
        let agent = DeclarativeAgent::load(&path).await?;
        Ok(Some(Box::new(agent)))
    }

    #[cfg(feature = "wasm")]
    async fn load_wasm(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Box<dyn Tool>>, ToolError> {
        let scratch = self.scratch_dir(name)?;
        let (manifest_path, bytes) = self.materialize(scratch.path(), namespace, name).await?;
        let manifest = WasmManifest::from_slice(name, &bytes)?;
        self.materialize(scratch.path(), namespace, &manifest.wasm_path)
            .await?;
        let tool = WasmTool::load(&manifest_path, &self.wasm_policy).await?;
        Ok(Some(Box::new(tool)))
    }

    #[cfg(not(feature = "wasm"))]
    async fn load_wasm(
        &self,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<Option<Box<dyn Tool>>, ToolError> {
        tracing::warn!(
            namespace = namespace.as_str(),
            artifact = name,
            "WASM agent skipped, built without the wasm feature"
        );
        Ok(None)
    }

    fn scratch_dir(&self, name: &str) -> Result<TempDir, ToolError> {
        let load_failed = |e: std::io::Error| ToolError::LoadFailed {
            source_name: name.to_string(),
            reason: format!("Failed to create scratch directory: {e}"),
        };
        std::fs::create_dir_all(&self.scratch_root).map_err(load_failed)?;
        tempfile::Builder::new()
            .prefix("questweaver-agent-")
            .tempdir_in(&self.scratch_root)
            .map_err(load_failed)
    }

    /// Copy one artifact into `dir`, returning its path and contents.
    async fn materialize(
        &self,
        dir: &Path,
        namespace: ArtifactNamespace,
        name: &str,
    ) -> Result<(PathBuf, Vec<u8>), ToolError> {
        let load_failed = |reason: String| ToolError::LoadFailed {
            source_name: format!("{}/{name}", namespace.as_str()),
            reason,
        };

        let bytes = self
            .store
            .read_artifact(namespace, name)
            .await
            .map_err(|e| load_failed(e.to_string()))?
            .ok_or_else(|| load_failed("artifact not found".into()))?;

        let path = dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| load_failed(format!("Failed to write scratch copy: {e}")))?;
        debug!(artifact = name, path = %path.display(), "Materialized agent artifact");
        Ok((path, bytes))
    }
}

fn is_candidate(name: &str) -> bool {
    name.ends_with(MANIFEST_SUFFIX) || name.ends_with(WASM_SUFFIX)
}

fn register(registry: &mut ToolRegistry, tool: Box<dyn Tool>, origin: &str) {
    let name = tool.name().to_string();
    match registry.register_from(tool, origin) {
        Ok(()) => debug!(tool = %name, source = origin, "Registered agent"),
        Err(e) => error!(tool = %name, source = origin, error = %e, "Agent rejected by registry"),
    }
}
