//! Error types for the QuestWeaver domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

/// Failures talking to the LLM endpoint. Every variant is treated as
/// transient by the dispatch loop.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid artifact name: {0}")]
    InvalidArtifact(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Failed to load tool from {source_name}: {reason}")]
    LoadFailed { source_name: String, reason: String },
}

impl From<MemoryError> for ToolError {
    fn from(e: MemoryError) -> Self {
        ToolError::ExecutionFailed {
            tool_name: "memory".into(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::LoadFailed {
            source_name: "agents/broken_agent.json".into(),
            reason: "missing field `name`".into(),
        };
        assert!(err.to_string().contains("broken_agent.json"));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn memory_error_converts_into_tool_error() {
        let err: ToolError = MemoryError::Unavailable("share offline".into()).into();
        assert!(err.to_string().contains("share offline"));
    }
}
