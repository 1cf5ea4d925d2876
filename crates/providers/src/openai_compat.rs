//! OpenAI-compatible provider implementation.
//!
//! Works with: Azure OpenAI deployments, OpenAI, and any endpoint exposing an
//! OpenAI-style `/chat/completions` route.
//!
//! Requests use the `functions` + `function_call: "auto"` form of function
//! calling. Replies are accepted in either the legacy `function_call` shape
//! or the newer `tool_calls` shape; only the first selected tool is used.

use async_trait::async_trait;
use questweaver_core::error::ProviderError;
use questweaver_core::message::{ConversationTurn, FunctionCall, Role};
use questweaver_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Where requests go and how they authenticate.
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{base_url}/chat/completions`, bearer token
    Compatible { base_url: String },
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions`, `api-key` header
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    endpoint: Endpoint,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for any OpenAI-compatible base URL.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Compatible {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
            api_key: api_key.into(),
            client: http_client(),
        }
    }

    /// Create an Azure OpenAI provider for one deployment.
    pub fn azure(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: Option<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: "azure".into(),
            endpoint: Endpoint::Azure {
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                deployment: deployment.into(),
                api_version: api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            },
            api_key: api_key.into(),
            client: http_client(),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// The chat-completions URL for this endpoint.
    pub fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::Compatible { base_url } => format!("{base_url}/chat/completions"),
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            ),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.endpoint {
            Endpoint::Compatible { .. } => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => request.header("api-key", self.api_key.as_str()),
        }
    }

    /// Convert our turns to OpenAI API format.
    fn to_api_messages(messages: &[ConversationTurn]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
                name: m.function_name.clone(),
                function_call: m.function_call.as_ref().map(|fc| ApiFunction {
                    name: fc.name.clone(),
                    arguments: serde_json::Value::String(fc.arguments.clone()),
                }),
            })
            .collect()
    }

    /// Convert tool definitions to the legacy `functions` format.
    fn to_api_functions(tools: &[ToolDefinition]) -> Vec<ApiFunctionDefinition> {
        tools
            .iter()
            .map(|t| ApiFunctionDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.functions.is_empty() {
            body["functions"] = serde_json::json!(Self::to_api_functions(&request.functions));
            body["function_call"] = serde_json::json!("auto");
        }

        body
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Model output arguments are usually a string, but some servers send an
/// object. Either way the dispatch loop wants the raw text.
fn arguments_text(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl questweaver_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = self.completions_url();
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            functions = request.functions.len(),
            "Sending completion request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let function_call = choice
            .message
            .function_call
            .or_else(|| {
                choice
                    .message
                    .tool_calls
                    .and_then(|calls| calls.into_iter().next())
                    .map(|tc| tc.function)
            })
            .map(|f| FunctionCall {
                name: f.name,
                arguments: arguments_text(Some(f.arguments)),
            });

        let message = ConversationTurn {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            function_name: None,
            function_call,
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }
}

// --- OpenAI API types (private) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionDefinition {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ApiReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<ApiFunction>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
