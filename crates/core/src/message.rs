//! Conversation turn domain types.
//!
//! These are the value objects that flow through the orchestration engine:
//! the HTTP boundary hands in raw history → the assembler normalizes it into
//! turns → the dispatch loop sends them to the provider and appends tool
//! results as `function` turns.

use serde::{Deserialize, Serialize};

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, memory snapshots, response format)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// A tool agent's result, named after the agent
    Function,
}

impl Role {
    /// Parse a role string; unknown roles yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "function" | "tool" => Some(Role::Function),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

/// The model's decision to invoke exactly one tool agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the agent to invoke
    pub name: String,

    /// Arguments as the raw string the model produced (may be malformed)
    pub arguments: String,
}

/// A single turn in a conversation.
///
/// `content` is always a string; anything else is coerced when the turn is
/// built from untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    #[serde(default)]
    pub content: String,

    /// For `function` turns, the agent that produced the content
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// For assistant turns, the tool the model selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ConversationTurn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            function_name: None,
            function_call: None,
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a function-result turn named after the agent that produced it.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            function_name: Some(name.into()),
            ..Self::new(Role::Function, content)
        }
    }

    /// Create an assistant turn carrying a tool selection.
    pub fn assistant_call(
        content: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
            ..Self::new(Role::Assistant, content)
        }
    }
}
