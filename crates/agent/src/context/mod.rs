//! Conversation assembly.
//!
//! Turns raw, untrusted history into well-formed turns and builds the
//! message list for one model call:
//!
//! | Position | Content |
//! |----------|---------|
//! | 1 | System prompt (persona, memory snapshots, agents, response format) |
//! | 2..n | Normalized history, newest `history_limit` entries |
//! | n+1 | The new user utterance |

pub mod assembler;

pub use assembler::{ConversationAssembler, Persona, normalize_turn, trim_history};
