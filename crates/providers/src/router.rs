//! Provider router: selects the correct LLM provider based on config.

use questweaver_config::{AppConfig, ProviderConfig};
use questweaver_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::openai_compat::OpenAiCompatProvider;

/// Holds every configured provider and knows which one is the default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// `azure` entries become Azure deployments (endpoint from `api_url`,
/// deployment from `deployment` or `default_model`); every other entry is an
/// OpenAI-compatible endpoint.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        router.register(name.clone(), build_one(name, provider_config, config));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let provider = build_one(&config.default_provider, &ProviderConfig::default(), config);
        router.register(config.default_provider.clone(), provider);
    }

    router
}

fn build_one(name: &str, provider_config: &ProviderConfig, config: &AppConfig) -> Arc<dyn Provider> {
    let api_key = provider_config
        .api_key
        .clone()
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    if name == "azure" {
        let endpoint = provider_config.api_url.clone().unwrap_or_else(|| {
            warn!("Azure provider has no endpoint; set AZURE_OPENAI_ENDPOINT");
            String::new()
        });
        let deployment = provider_config
            .deployment
            .clone()
            .unwrap_or_else(|| config.default_model.clone());
        return Arc::new(OpenAiCompatProvider::azure(
            endpoint,
            deployment,
            provider_config.api_version.clone(),
            api_key,
        ));
    }

    let base_url = provider_config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(name));
    Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
