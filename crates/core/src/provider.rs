//! Provider trait: the abstraction over LLM chat endpoints.
//!
//! A Provider sends the assembled conversation plus the declarative schema of
//! every registered tool agent, and gets back either free text or a single
//! selected tool with arguments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::ConversationTurn;

/// A single chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model or deployment to use
    pub model: String,

    /// The conversation turns, system prompt first
    pub messages: Vec<ConversationTurn>,

    /// Tool agents the model may select
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<ToolDefinition>,

    /// Temperature (0.0 = deterministic, 2.0 = wild)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows which agents it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The agent name
    pub name: String,

    /// Description of what the agent does
    pub description: String,

    /// JSON Schema describing the agent's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant turn; `function_call` is set when the model
    /// selected a tool
    pub message: ConversationTurn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "azure", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
