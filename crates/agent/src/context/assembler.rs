//! The conversation assembler.
//!
//! Normalization is total: whatever shape a history entry has, it becomes a
//! turn with a role and string content.

use chrono::Local;
use questweaver_core::message::{ConversationTurn, FunctionCall, Role};
use questweaver_core::provider::ToolDefinition;
use serde_json::Value;
use tracing::debug;

use crate::codec::GAME_DATA_DELIMITER;
use crate::identity::identity_signal;
use crate::memory_context::MemoryContext;

const DATETIME_FORMAT: &str = "%A, %B %d, %Y at %I:%M %p";

/// Who the game master is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new("GameMaster", "An immersive AI game master for dynamic storytelling")
    }
}

/// Builds the message list for each model call.
#[derive(Debug, Clone)]
pub struct ConversationAssembler {
    persona: Persona,
    history_limit: usize,
}

impl ConversationAssembler {
    pub fn new(persona: Persona, history_limit: usize) -> Self {
        Self {
            persona,
            history_limit,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Trim raw history to the limit and normalize every entry.
    pub fn prepare_history(&self, raw: Vec<Value>) -> Vec<ConversationTurn> {
        trim_history(raw, self.history_limit)
            .iter()
            .map(normalize_turn)
            .collect()
    }

    /// System turn, history (minus a leading identity signal), then the new
    /// user turn.
    pub fn assemble(
        &self,
        history: &[ConversationTurn],
        memory: &MemoryContext,
        tools: &[ToolDefinition],
        utterance: &str,
    ) -> Vec<ConversationTurn> {
        let skip = match history.first() {
            Some(first) if identity_signal(first).is_some() => 1,
            _ => 0,
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ConversationTurn::system(self.build_system_prompt(memory, tools)));
        messages.extend(history.iter().skip(skip).cloned());
        messages.push(ConversationTurn::user(utterance));

        debug!(
            history = history.len(),
            skipped_signal = skip == 1,
            tools = tools.len(),
            "Conversation assembled"
        );
        messages
    }

    pub fn build_system_prompt(&self, memory: &MemoryContext, tools: &[ToolDefinition]) -> String {
        let now = Local::now().format(DATETIME_FORMAT).to_string();
        self.render_system_prompt(memory, tools, &now)
    }

    fn render_system_prompt(&self, memory: &MemoryContext, tools: &[ToolDefinition], now: &str) -> String {
        let agents = if tools.is_empty() {
            "- No agents are currently available. Narrate without them.".to_string()
        } else {
            tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"
<identity>
You are {name}, an AI Game Master for Runecraft 3D, an immersive open-world RPG experience. You orchestrate dynamic storytelling, manage NPCs, generate quests, and create emergent gameplay through intelligent agent systems.
Your character: {description}
The current date and time is {now}.
</identity>

<game_master_role>
You are responsible for:
- Creating dynamic, branching storylines based on player actions
- Managing NPC behaviors and dialogues through specialized agents
- Generating procedural quests and world events
- Balancing game difficulty and progression
- Creating immersive narrative experiences
- Responding to player choices with meaningful consequences
- Orchestrating multiple AI agents for different game systems
</game_master_role>

<shared_memory_output>
World State and Lore:
{shared}
</shared_memory_output>

<specific_memory_output>
Player Journey and Choices:
{specific}
</specific_memory_output>

<context_instructions>
- Use shared memory for world lore, faction states, and global events
- Use specific memory for player choices, relationships, and personal quest progress
- Create emergent narratives by combining both contexts
- Ensure continuity across sessions while allowing for dynamic world evolution
</context_instructions>

<agent_orchestration>
You have access to specialized agents that control different aspects of the game:
{agents}

Use these agents to create a living, breathing world that responds to player actions.
</agent_orchestration>

<narrative_guidelines>
- Create stories that adapt to player choices, not predetermined paths
- Generate NPCs with persistent personalities and memories
- Design quests that emerge from world state and player history
- Balance challenge with player skill and progression
- Create memorable moments through unexpected events
- Maintain narrative coherence while allowing player freedom
</narrative_guidelines>

<response_format>
Structure responses with game data and narrative:

1. NARRATIVE PART: Rich storytelling and descriptions
2. GAME_DATA delimiter {delimiter}
3. JSON game state updates for the client

Example:
The ancient dragon's eyes narrow as you approach...

{delimiter}
{{"event": "boss_encounter", "boss_id": "ancient_dragon", "dialogue": "..."}}
</response_format>
"#,
            name = self.persona.name,
            description = self.persona.description,
            shared = memory.shared,
            specific = memory.specific,
            delimiter = GAME_DATA_DELIMITER,
        )
    }
}

/// Keep the newest `limit` entries.
pub fn trim_history(mut history: Vec<Value>, limit: usize) -> Vec<Value> {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
        debug!(dropped = excess, kept = limit, "Trimmed conversation history");
    }
    history
}

/// Coerce any JSON value into a well-formed turn.
pub fn normalize_turn(raw: &Value) -> ConversationTurn {
    let obj = match raw {
        Value::Null => return ConversationTurn::user(""),
        Value::Object(obj) => obj,
        other => return ConversationTurn::user(text_of(other)),
    };

    let role = obj
        .get("role")
        .and_then(|r| r.as_str())
        .and_then(Role::parse)
        .unwrap_or(Role::User);
    let content = obj.get("content").map(text_of).unwrap_or_default();

    ConversationTurn {
        role,
        content,
        function_name: obj.get("name").and_then(|n| n.as_str()).map(str::to_string),
        function_call: obj.get("function_call").and_then(function_call_of),
    }
}

/// Strings as-is, `null` as empty, anything else as JSON text.
fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn function_call_of(value: &Value) -> Option<FunctionCall> {
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = value.get("arguments").map(text_of).unwrap_or_default();
    Some(FunctionCall { name, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn tool(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object"}),
        }
    }

    fn assembler() -> ConversationAssembler {
        ConversationAssembler::new(Persona::new("Mira", "A wry storyteller"), 20)
    }

    #[test]
    fn normalize_shapes() {
        assert_eq!(normalize_turn(&Value::Null), ConversationTurn::user(""));
        assert_eq!(normalize_turn(&json!(42)), ConversationTurn::user("42"));
        assert_eq!(normalize_turn(&json!("hey")), ConversationTurn::user("hey"));
        assert_eq!(normalize_turn(&json!({"content": "no role"})), ConversationTurn::user("no role"));
        assert_eq!(normalize_turn(&json!({"role": "wizard", "content": "x"})), ConversationTurn::user("x"));
        assert_eq!(normalize_turn(&json!({"role": "assistant"})), ConversationTurn::assistant(""));
        assert_eq!(
            normalize_turn(&json!({"role": "assistant", "content": null})),
            ConversationTurn::assistant("")
        );
        assert_eq!(
            normalize_turn(&json!({"role": "user", "content": {"a": [1, true]}})),
            ConversationTurn::user(r#"{"a":[1,true]}"#)
        );
        assert_eq!(
            normalize_turn(&json!({"role": "function", "name": "GameWorld", "content": "{}"})),
            ConversationTurn::function("GameWorld", "{}")
        );
    }

    #[test]
    fn normalize_keeps_function_call() {
        let turn = normalize_turn(&json!({
            "role": "assistant",
            "content": null,
            "function_call": {"name": "GameWorld", "arguments": {"action": "get_world_state"}}
        }));
        assert_eq!(
            turn,
            ConversationTurn::assistant_call("", "GameWorld", r#"{"action":"get_world_state"}"#)
        );
    }

    #[test]
    fn trim_drops_oldest() {
        let history: Vec<Value> = (0..25).map(|i| json!({"role": "user", "content": i.to_string()})).collect();
        let trimmed = trim_history(history, 20);
        assert_eq!(trimmed.len(), 20);
        assert_eq!(trimmed[0]["content"], "5");
        assert_eq!(trimmed[19]["content"], "24");
    }

    #[test]
    fn assemble_orders_turns() {
        let history = assembler().prepare_history(vec![
            json!({"role": "user", "content": "I enter the tavern"}),
            json!({"role": "assistant", "content": "The barkeep nods."}),
        ]);
        let messages = assembler().assemble(&history, &MemoryContext::default(), &[], "I order ale");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "I enter the tavern");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3], ConversationTurn::user("I order ale"));
    }

    #[test]
    fn leading_identity_signal_excluded() {
        let history = assembler().prepare_history(vec![
            json!({"role": "user", "content": " 123E4567-e89b-12d3-a456-426614174000 "}),
            json!({"role": "assistant", "content": "Welcome back."}),
        ]);
        let messages = assembler().assemble(&history, &MemoryContext::default(), &[], "hi");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "Welcome back.");
    }

    #[test]
    fn later_guid_turns_kept() {
        let history = assembler().prepare_history(vec![
            json!({"role": "user", "content": "hello"}),
            json!({"role": "user", "content": "123e4567-e89b-12d3-a456-426614174000"}),
        ]);
        let messages = assembler().assemble(&history, &MemoryContext::default(), &[], "hi");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn system_prompt_sections() {
        let memory = MemoryContext {
            shared: r#"{"lore":"The moon is cracked"}"#.into(),
            specific: r#"{"memories":["Owes a debt"]}"#.into(),
        };
        let prompt = assembler().render_system_prompt(
            &memory,
            &[tool("GameWorld", "Tracks time and weather"), tool("NPCDialogue", "Voices NPCs")],
            "Monday, March 02, 2026 at 09:15 AM",
        );

        assert!(prompt.contains("You are Mira, an AI Game Master for Runecraft 3D"));
        assert!(prompt.contains("Your character: A wry storyteller"));
        assert!(prompt.contains("Monday, March 02, 2026 at 09:15 AM"));
        assert!(prompt.contains("World State and Lore:\n{\"lore\":\"The moon is cracked\"}"));
        assert!(prompt.contains("Player Journey and Choices:\n{\"memories\":[\"Owes a debt\"]}"));
        assert!(prompt.contains("- GameWorld: Tracks time and weather\n- NPCDialogue: Voices NPCs"));
        assert!(prompt.contains("|||GAME_DATA|||\n{\"event\": \"boss_encounter\""));
        for tag in [
            "<identity>",
            "<game_master_role>",
            "<shared_memory_output>",
            "<specific_memory_output>",
            "<context_instructions>",
            "<agent_orchestration>",
            "<narrative_guidelines>",
            "<response_format>",
        ] {
            assert!(prompt.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn system_prompt_without_agents() {
        let prompt = assembler().render_system_prompt(&MemoryContext::default(), &[], "now");
        assert!(prompt.contains("No agents are currently available"));
        assert!(prompt.contains("No shared context memory available."));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("(role|content|name|[a-z]{1,6})", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn normalization_is_total(raw in arb_json()) {
            let turn = normalize_turn(&raw);
            let serialized = serde_json::to_value(&turn).unwrap();
            prop_assert!(serialized["content"].is_string());
            prop_assert!(serialized["role"].is_string());
        }
    }
}
