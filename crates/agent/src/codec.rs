//! Response codec: narrative text plus a JSON game-data payload.
//!
//! The model is asked to answer as
//!
//! ```text
//! The ancient dragon's eyes narrow as you approach...
//!
//! |||GAME_DATA|||
//! {"event": "boss_encounter", "boss_id": "ancient_dragon"}
//! ```
//!
//! Decoding never fails: a missing delimiter or unparsable payload yields an
//! empty object.

use serde_json::Value;

pub const GAME_DATA_DELIMITER: &str = "|||GAME_DATA|||";

/// Split a model answer into narrative and game data.
pub fn decode(text: &str) -> (String, Value) {
    let Some((narrative, payload)) = text.split_once(GAME_DATA_DELIMITER) else {
        return (text.trim().to_string(), empty_object());
    };

    let payload = strip_code_fence(payload.trim());
    let data = if payload.is_empty() {
        empty_object()
    } else {
        serde_json::from_str(payload).unwrap_or_else(|_| empty_object())
    };
    (narrative.trim().to_string(), data)
}

/// Join narrative and game data the way the model is asked to.
pub fn encode(narrative: &str, data: &Value) -> String {
    format!("{narrative}\n\n{GAME_DATA_DELIMITER}\n{data}")
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Remove a surrounding ```json ... ``` fence if present.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
