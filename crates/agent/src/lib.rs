//! The QuestWeaver orchestration engine.
//!
//! Each turn goes through the same steps:
//!
//! 1. **Normalize** the raw history and trim it to the newest entries
//! 2. **Resolve** which user's memory the turn works against
//! 3. **Snapshot** shared and per-user memory when the identity changes
//! 4. **Assemble** system prompt, history and the new utterance
//! 5. **Dispatch**: call the model, run at most one agent per call, follow up
//! 6. **Decode** the reply into narrative and game data
//!
//! Every failure along the way becomes a result the client can show; the
//! engine itself never returns an error for a turn.

pub mod args;
pub mod codec;
pub mod context;
pub mod identity;
pub mod loop_runner;
pub mod memory_context;
pub mod session;

pub use codec::{GAME_DATA_DELIMITER, decode, encode};
pub use context::{ConversationAssembler, Persona, normalize_turn, trim_history};
pub use identity::{IdentitySources, extract_user_guid, guid_from_history, resolve};
pub use loop_runner::{DispatchLoop, DispatchResult, SERVICE_UNAVAILABLE};
pub use memory_context::MemoryContext;
pub use session::{Orchestrator, Session, TurnOutcome, TurnRequest, WORLD_INIT_NARRATIVE};
