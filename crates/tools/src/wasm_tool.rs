//! WASM agents: sandboxed WebAssembly modules loaded at discovery time.
//!
//! A WASM agent is published to the store as two artifacts: a manifest
//! ending in `_agent.tool.json` and the compiled module it names through
//! `wasm_path`. The module runs in a wasmtime instance with an empty linker
//! (no WASI, no host imports), bounded by fuel, memory and a wall-clock
//! timeout.
//!
//! # Module interface
//!
//! ```wat
//! (memory (export "memory") 1)
//! (func (export "alloc") (param i32) (result i32))
//! (func (export "execute") (param i32 i32) (result i32))
//! ```
//!
//! `execute` receives a pointer and length to the UTF-8 JSON arguments and
//! returns a pointer to a null-terminated UTF-8 result. An empty result means
//! the agent completed with no output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use wasmtime::{Config, Engine, Linker, Module, Store, Trap};

use questweaver_core::error::ToolError;
use questweaver_core::tool::{Tool, ToolArgs};

/// Upper bounds applied to every WASM agent, whatever its manifest asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmPolicy {
    #[serde(default = "default_policy_max_memory")]
    pub max_memory_bytes: usize,
    #[serde(default = "default_policy_max_fuel")]
    pub max_fuel: u64,
    #[serde(default = "default_policy_max_timeout")]
    pub max_timeout_ms: u64,
}

fn default_policy_max_memory() -> usize {
    64 * 1024 * 1024
}

fn default_policy_max_fuel() -> u64 {
    10_000_000_000
}

fn default_policy_max_timeout() -> u64 {
    60_000
}

impl Default for WasmPolicy {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_policy_max_memory(),
            max_fuel: default_policy_max_fuel(),
            max_timeout_ms: default_policy_max_timeout(),
        }
    }
}

impl WasmPolicy {
    /// Clamp a manifest's limits to this policy. Zero fuel or timeout means
    /// "use the policy maximum".
    pub fn clamp(&self, manifest: &mut WasmManifest) {
        if manifest.max_memory_bytes > self.max_memory_bytes {
            warn!(
                agent = %manifest.name,
                requested = manifest.max_memory_bytes,
                allowed = self.max_memory_bytes,
                "Clamping WASM memory limit"
            );
            manifest.max_memory_bytes = self.max_memory_bytes;
        }
        if manifest.max_fuel == 0 || manifest.max_fuel > self.max_fuel {
            manifest.max_fuel = self.max_fuel;
        }
        if manifest.timeout_ms == 0 || manifest.timeout_ms > self.max_timeout_ms {
            manifest.timeout_ms = self.max_timeout_ms;
        }
    }
}

/// A WASM agent manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmManifest {
    pub name: String,
    pub description: String,
    #[serde(alias = "parameters_schema")]
    pub parameters: serde_json::Value,
    /// Module artifact, relative to the manifest.
    pub wasm_path: String,
    #[serde(default)]
    pub user_scoped: bool,
    #[serde(default = "default_max_memory")]
    pub max_memory_bytes: usize,
    #[serde(default = "default_max_fuel")]
    pub max_fuel: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_memory() -> usize {
    16 * 1024 * 1024
}

fn default_max_fuel() -> u64 {
    1_000_000_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl WasmManifest {
    pub fn from_slice(source_name: &str, bytes: &[u8]) -> Result<Self, ToolError> {
        serde_json::from_slice(bytes).map_err(|e| ToolError::LoadFailed {
            source_name: source_name.to_string(),
            reason: format!("Invalid WASM manifest: {e}"),
        })
    }
}

/// Per-call settings handed to the blocking executor.
#[derive(Debug, Clone)]
struct RunLimits {
    name: String,
    max_fuel: u64,
    max_memory_bytes: usize,
}

/// A tool agent backed by a compiled WASM module.
pub struct WasmTool {
    manifest: WasmManifest,
    engine: Engine,
    module: Module,
}

impl std::fmt::Debug for WasmTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmTool")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl WasmTool {
    /// Load a materialized manifest and compile the module it names.
    pub async fn load(manifest_path: &Path, policy: &WasmPolicy) -> Result<Self, ToolError> {
        let source_name = manifest_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("manifest")
            .to_string();
        let bytes = tokio::fs::read(manifest_path)
            .await
            .map_err(|e| ToolError::LoadFailed {
                source_name: source_name.clone(),
                reason: format!("Failed to read manifest: {e}"),
            })?;
        let manifest = WasmManifest::from_slice(&source_name, &bytes)?;

        let module_path = manifest_path
            .parent()
            .map(|dir| dir.join(&manifest.wasm_path))
            .unwrap_or_else(|| manifest.wasm_path.clone().into());
        let module_bytes = tokio::fs::read(&module_path)
            .await
            .map_err(|e| ToolError::LoadFailed {
                source_name: source_name.clone(),
                reason: format!("Failed to read module '{}': {e}", manifest.wasm_path),
            })?;

        Self::compile(manifest, &module_bytes, policy)
    }

    /// Compile a module for an already parsed manifest.
    pub fn compile(
        mut manifest: WasmManifest,
        module_bytes: &[u8],
        policy: &WasmPolicy,
    ) -> Result<Self, ToolError> {
        policy.clamp(&mut manifest);

        let mut engine_config = Config::new();
        engine_config.consume_fuel(true);
        let engine = Engine::new(&engine_config).map_err(|e| ToolError::LoadFailed {
            source_name: manifest.name.clone(),
            reason: format!("Failed to create WASM engine: {e}"),
        })?;
        let module = Module::new(&engine, module_bytes).map_err(|e| ToolError::LoadFailed {
            source_name: manifest.name.clone(),
            reason: format!("Failed to compile WASM module: {e}"),
        })?;

        info!(
            agent = %manifest.name,
            max_memory = manifest.max_memory_bytes,
            max_fuel = manifest.max_fuel,
            timeout_ms = manifest.timeout_ms,
            "Loaded WASM agent"
        );

        Ok(Self {
            manifest,
            engine,
            module,
        })
    }

    pub fn manifest(&self) -> &WasmManifest {
        &self.manifest
    }

    fn limits(&self) -> RunLimits {
        RunLimits {
            name: self.manifest.name.clone(),
            max_fuel: self.manifest.max_fuel,
            max_memory_bytes: self.manifest.max_memory_bytes,
        }
    }
}

fn failed(limits: &RunLimits, reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: limits.name.clone(),
        reason: reason.into(),
    }
}

/// Instantiate the module and run one call. Blocking.
fn run_module(engine: &Engine, module: &Module, limits: &RunLimits, input: &str) -> Result<String, ToolError> {
    let mut store = Store::new(engine, ());
    store
        .set_fuel(limits.max_fuel)
        .map_err(|e| failed(limits, format!("Failed to set fuel: {e}")))?;

    let linker = Linker::new(engine);
    let instance = linker
        .instantiate(&mut store, module)
        .map_err(|e| failed(limits, format!("WASM instantiation failed: {e}")))?;

    let memory = instance
        .get_memory(&mut store, "memory")
        .ok_or_else(|| failed(limits, "WASM module must export 'memory'"))?;
    let size = memory.data_size(&store);
    if size > limits.max_memory_bytes {
        return Err(failed(
            limits,
            format!("WASM memory ({size} bytes) exceeds limit ({} bytes)", limits.max_memory_bytes),
        ));
    }

    let alloc = instance
        .get_typed_func::<i32, i32>(&mut store, "alloc")
        .map_err(|e| failed(limits, format!("WASM module must export 'alloc(i32) -> i32': {e}")))?;
    let execute = instance
        .get_typed_func::<(i32, i32), i32>(&mut store, "execute")
        .map_err(|e| failed(limits, format!("WASM module must export 'execute(i32, i32) -> i32': {e}")))?;

    let input = input.as_bytes();
    let input_len = i32::try_from(input.len()).map_err(|_| failed(limits, "Arguments too large"))?;
    let input_ptr = alloc
        .call(&mut store, input_len)
        .map_err(|e| failed(limits, format!("alloc failed: {e}")))?;

    let start = usize::try_from(input_ptr).map_err(|_| failed(limits, "Negative alloc pointer"))?;
    let data = memory.data_mut(&mut store);
    let end = start + input.len();
    if end > data.len() {
        return Err(failed(limits, "Arguments do not fit in WASM memory"));
    }
    data[start..end].copy_from_slice(input);

    let result_ptr = execute.call(&mut store, (input_ptr, input_len)).map_err(|e| {
        if matches!(e.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
            failed(limits, "WASM execution exceeded fuel limit")
        } else {
            failed(limits, format!("WASM execute failed: {e}"))
        }
    })?;

    let data = memory.data(&store);
    let start = usize::try_from(result_ptr).map_err(|_| failed(limits, "Invalid result pointer from WASM"))?;
    if start >= data.len() {
        return Err(failed(limits, "Invalid result pointer from WASM"));
    }
    let end = data[start..]
        .iter()
        .position(|&b| b == 0)
        .map_or(data.len(), |pos| start + pos);

    std::str::from_utf8(&data[start..end])
        .map(str::to_string)
        .map_err(|e| failed(limits, format!("Invalid UTF-8 in WASM output: {e}")))
}

#[async_trait]
impl Tool for WasmTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.manifest.parameters.clone()
    }

    fn user_scoped(&self) -> bool {
        self.manifest.user_scoped
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Option<String>, ToolError> {
        let input = serde_json::to_string(&arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("Failed to serialize arguments: {e}")))?;
        debug!(agent = %self.manifest.name, "Executing WASM agent");

        let engine = self.engine.clone();
        let module = self.module.clone();
        let limits = self.limits();
        let task = tokio::task::spawn_blocking(move || run_module(&engine, &module, &limits, &input));

        // Fuel bounds the blocking thread; the timeout bounds the caller.
        let timeout = Duration::from_millis(self.manifest.timeout_ms);
        let output = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => return Err(failed(&self.limits(), format!("WASM task failed: {join}"))),
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: self.manifest.name.clone(),
                    timeout_secs: self.manifest.timeout_ms.div_ceil(1000),
                });
            }
        };

        Ok(if output.is_empty() { None } else { Some(output) })
    }
}
