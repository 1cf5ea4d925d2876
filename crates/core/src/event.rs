//! Domain event system: decoupled observation of the orchestration engine.
//!
//! The dispatch loop publishes events as a turn progresses. Subscribers
//! (tests, the CLI's verbose mode) can watch without touching the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model was called
    ModelCalled {
        attempt: u32,
        model: String,
        tools_offered: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool agent was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed and will be retried
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The active user identity changed and snapshots were re-fetched
    ContextSwitched {
        user_guid: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn ended with a user-visible failure
    TurnFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
