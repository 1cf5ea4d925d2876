//! Configuration loading, validation, and management for QuestWeaver.
//!
//! Loads configuration from `~/.questweaver/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.questweaver/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model (the deployment name for Azure)
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Game master persona
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Dispatch loop and context settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Memory store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "azure".into()
}
fn default_model() -> String {
    "gpt-deployment".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("persona", &self.persona)
            .field("orchestrator", &self.orchestrator)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_characteristic_description")]
    pub characteristic_description: String,
}

fn default_assistant_name() -> String {
    "GameMaster".into()
}
fn default_characteristic_description() -> String {
    "An immersive AI game master for dynamic storytelling".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            characteristic_description: default_characteristic_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Model-call attempts per turn before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed sleep between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Most recent history turns kept
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Character budget for each memory snapshot in the system prompt
    #[serde(default = "default_memory_budget_chars")]
    pub memory_budget_chars: usize,

    /// Cache discovered agents this long; 0 re-discovers for every session
    #[serde(default)]
    pub discovery_ttl_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_history_limit() -> usize {
    20
}
fn default_memory_budget_chars() -> usize {
    5000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            history_limit: default_history_limit(),
            memory_budget_chars: default_memory_budget_chars(),
            discovery_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON documents on disk
    #[default]
    File,
    /// In-process only, lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the file store; defaults to `~/.questweaver/data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Where runtime-loaded agents are materialized; defaults to the OS temp dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            root: None,
            scratch_dir: None,
        }
    }
}

impl StorageConfig {
    /// The effective file-store root.
    pub fn resolved_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("data"))
    }

    /// The effective scratch root.
    pub fn resolved_scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    7071
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (OpenAI-compatible) or resource endpoint (Azure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Azure `api-version` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Azure deployment name; falls back to `default_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.questweaver/config.toml).
    ///
    /// Environment variables override the file; see [`AppConfig::apply_env`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// - API key: `QUESTWEAVER_API_KEY`, then `AZURE_OPENAI_API_KEY`, then
    ///   `OPENAI_API_KEY` (only when the file set none)
    /// - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_VERSION`,
    ///   `AZURE_OPENAI_DEPLOYMENT_NAME` fill `[providers.azure]`
    /// - `QUESTWEAVER_PROVIDER`, `QUESTWEAVER_MODEL`,
    ///   `QUESTWEAVER_STORAGE_ROOT`, `ASSISTANT_NAME`,
    ///   `CHARACTERISTIC_DESCRIPTION` replace their settings
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("QUESTWEAVER_API_KEY")
                .or_else(|| lookup("AZURE_OPENAI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        let endpoint = lookup("AZURE_OPENAI_ENDPOINT");
        let version = lookup("AZURE_OPENAI_API_VERSION");
        let deployment = lookup("AZURE_OPENAI_DEPLOYMENT_NAME");
        if endpoint.is_some() || version.is_some() || deployment.is_some() {
            let azure = self.providers.entry("azure".into()).or_default();
            if endpoint.is_some() {
                azure.api_url = endpoint;
            }
            if version.is_some() {
                azure.api_version = version;
            }
            if deployment.is_some() {
                azure.deployment = deployment;
            }
        }

        if let Some(provider) = lookup("QUESTWEAVER_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("QUESTWEAVER_MODEL") {
            self.default_model = model;
        }
        if let Some(root) = lookup("QUESTWEAVER_STORAGE_ROOT") {
            self.storage.root = Some(PathBuf::from(root));
        }
        if let Some(name) = lookup("ASSISTANT_NAME") {
            self.persona.assistant_name = name;
        }
        if let Some(desc) = lookup("CHARACTERISTIC_DESCRIPTION") {
            self.persona.characteristic_description = desc;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".questweaver")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.orchestrator.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_retries must be at least 1".into(),
            ));
        }

        if self.orchestrator.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.history_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            persona: PersonaConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "azure");
        assert_eq!(config.orchestrator.max_retries, 3);
        assert_eq!(config.orchestrator.retry_delay_ms, 2000);
        assert_eq!(config.orchestrator.history_limit, 20);
        assert_eq!(config.orchestrator.memory_budget_chars, 5000);
        assert_eq!(config.persona.assistant_name, "GameMaster");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.storage.backend, StorageBackend::File);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retries_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "azure");
    }

    #[test]
    fn loads_sections_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[persona]
assistant_name = "Dungeon Keeper"

[orchestrator]
max_retries = 5
discovery_ttl_secs = 60

[storage]
backend = "memory"

[providers.openai]
api_key = "sk-test"
api_url = "https://api.openai.com/v1"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.persona.assistant_name, "Dungeon Keeper");
        // unspecified persona field keeps its default
        assert_eq!(
            config.persona.characteristic_description,
            "An immersive AI game master for dynamic storytelling"
        );
        assert_eq!(config.orchestrator.max_retries, 5);
        assert_eq!(config.orchestrator.retry_delay_ms, 2000);
        assert_eq!(config.orchestrator.discovery_ttl_secs, 60);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.has_api_key());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_fill_azure_section() {
        let mut config = AppConfig::default();
        config.apply_env(env_from(&[
            ("AZURE_OPENAI_API_KEY", "azure-key"),
            ("OPENAI_API_KEY", "openai-key"),
            ("AZURE_OPENAI_ENDPOINT", "https://rune.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gm-4o"),
            ("ASSISTANT_NAME", "Loremaster"),
        ]));

        assert_eq!(config.api_key.as_deref(), Some("azure-key"));
        let azure = &config.providers["azure"];
        assert_eq!(azure.api_url.as_deref(), Some("https://rune.openai.azure.com"));
        assert_eq!(azure.deployment.as_deref(), Some("gm-4o"));
        assert!(azure.api_version.is_none());
        assert_eq!(config.persona.assistant_name, "Loremaster");
    }

    #[test]
    fn env_does_not_replace_file_api_key() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env_from(&[("QUESTWEAVER_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "azure".into(),
            ProviderConfig {
                api_key: Some("also-secret".into()),
                ..ProviderConfig::default()
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("also-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("azure"));
        assert!(toml_str.contains("[orchestrator]"));
    }
}
