//! # QuestWeaver Core
//!
//! Domain types, traits, and error definitions for the QuestWeaver
//! game-master orchestrator. This crate has **zero framework dependencies**;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, memory store, tool agent) is a
//! trait here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/failing stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod identity;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{MemoryError, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use identity::{DEFAULT_USER_GUID, UserGuid, is_guid};
pub use memory::{ArtifactNamespace, ContextKey, MemoryStore};
pub use message::{ConversationTurn, FunctionCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{IDENTITY_SENSITIVE_TOOLS, Tool, ToolArgs, ToolRegistry, is_identity_sensitive};
