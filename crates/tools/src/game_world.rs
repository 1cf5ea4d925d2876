//! GameWorld: the world clock, weather, seasons, factions and world events.
//!
//! State lives under the `world_state` field of the caller's document, so
//! each player has their own world. Without an identity the shared
//! document is used.

use async_trait::async_trait;
use questweaver_core::error::ToolError;
use questweaver_core::memory::MemoryStore;
use questweaver_core::tool::{Tool, ToolArgs};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::{context_key_from_args, error_payload};

pub const WEATHER_TYPES: &[&str] = &["clear", "rain", "storm", "fog", "snow", "sandstorm"];
pub const SEASONS: &[&str] = &["spring", "summer", "autumn", "winter"];
pub const FACTIONS: &[&str] = &["Kingdom", "Rebels", "Merchants", "Wizards", "Thieves", "Dragons"];
pub const WORLD_EVENTS: &[&str] = &[
    "merchant_caravan",
    "bandit_attack",
    "dragon_sighting",
    "meteor_shower",
    "magical_anomaly",
    "festival",
    "plague_outbreak",
    "treasure_discovery",
    "portal_opening",
    "ancient_awakening",
];
pub const ENTITY_TYPES: &[&str] = &["merchant", "dragon", "wanderer", "bandit", "treasure", "portal"];

const DAYS_PER_SEASON: u32 = 30;
/// One year; longer jumps are clamped.
const MAX_ADVANCE_HOURS: u32 = 24 * 365;
const NEUTRAL_STANDING: i64 = 50;
const HOSTILE_BELOW: i64 = 20;
const ALLIED_ABOVE: i64 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub time_of_day: u32,
    pub day_count: u32,
    pub weather: String,
    pub season: String,
    #[serde(default)]
    pub active_events: Vec<WorldEvent>,
    #[serde(default = "default_faction_standings")]
    pub faction_standings: BTreeMap<String, i64>,
    #[serde(default)]
    pub world_threats: Vec<String>,
    #[serde(default = "default_world_stability")]
    pub world_stability: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub event_type: String,
    pub name: String,
    pub description: String,
    /// Days
    pub duration: u32,
    #[serde(default)]
    pub effects: Value,
}

fn default_faction_standings() -> BTreeMap<String, i64> {
    FACTIONS
        .iter()
        .map(|f| (f.to_string(), NEUTRAL_STANDING))
        .collect()
}

fn default_world_stability() -> i64 {
    75
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            time_of_day: 12,
            day_count: 1,
            weather: "clear".into(),
            season: "spring".into(),
            active_events: Vec::new(),
            faction_standings: default_faction_standings(),
            world_threats: Vec::new(),
            world_stability: default_world_stability(),
        }
    }
}

impl WorldState {
    /// Move the clock forward. Every midnight crossed starts a new day and
    /// every thirtieth day turns the season. Returns the days passed.
    pub fn advance(&mut self, hours: u32) -> u32 {
        let total = u64::from(self.time_of_day) + u64::from(hours);
        self.time_of_day = (total % 24) as u32;
        let days = u32::try_from(total / 24).unwrap_or(u32::MAX);

        let before = self.day_count;
        self.day_count = before.saturating_add(days);
        let turns = self.day_count / DAYS_PER_SEASON - before / DAYS_PER_SEASON;
        for _ in 0..turns % SEASONS.len() as u32 {
            self.season = next_season(&self.season).to_string();
        }
        days
    }

    /// Shift a faction's standing, clamped to 0..=100. A faction that turns
    /// hostile becomes a world threat. Returns the old and new standing.
    pub fn shift_standing(&mut self, faction: &str, change: i64) -> (i64, i64) {
        let old = self
            .faction_standings
            .get(faction)
            .copied()
            .unwrap_or(NEUTRAL_STANDING);
        let new = old.saturating_add(change).clamp(0, 100);
        self.faction_standings.insert(faction.to_string(), new);
        if new < HOSTILE_BELOW {
            self.add_threat(format!("{faction}_hostility"));
        }
        (old, new)
    }

    /// Record an event and apply its effect on stability and threats.
    pub fn apply_event(&mut self, event: WorldEvent) {
        match event.event_type.as_str() {
            "dragon_sighting" => {
                self.add_threat("ancient_dragon".to_string());
                self.shift_stability(-10);
            }
            "festival" => self.shift_stability(5),
            "plague_outbreak" => self.shift_stability(-15),
            _ => {}
        }
        self.active_events.push(event);
    }

    fn shift_stability(&mut self, change: i64) {
        self.world_stability = self.world_stability.saturating_add(change).clamp(0, 100);
    }

    fn add_threat(&mut self, threat: String) {
        if !self.world_threats.contains(&threat) {
            self.world_threats.push(threat);
        }
    }
}

fn next_season(current: &str) -> &'static str {
    let idx = SEASONS.iter().position(|s| *s == current).unwrap_or(0);
    SEASONS[(idx + 1) % SEASONS.len()]
}

fn consequences(faction: &str, standing: i64) -> Vec<String> {
    if standing < HOSTILE_BELOW {
        vec![format!("{faction} becomes hostile")]
    } else if standing > ALLIED_ABOVE {
        vec![format!("{faction} offers alliance")]
    } else {
        Vec::new()
    }
}

fn weather_effects(weather: &str) -> Value {
    match weather {
        "rain" => json!({"visibility": -2, "fire_damage": -50, "water_magic": 20}),
        "storm" => json!({"visibility": -4, "lightning_chance": 30, "flying_disabled": true}),
        "fog" => json!({"visibility": -5, "stealth": 30, "ranged_accuracy": -20}),
        "snow" => json!({"movement_speed": -20, "ice_magic": 30, "fire_resistance": -10}),
        "sandstorm" => json!({"visibility": -3, "earth_magic": 20, "healing": -10}),
        "clear" => json!({"visibility": 0, "all_magic": 5, "morale": 10}),
        _ => json!({}),
    }
}

fn world_event(event_type: &str) -> WorldEvent {
    let known = |name: &str, description: &str, duration, effects| WorldEvent {
        event_type: event_type.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        duration,
        effects,
    };
    match event_type {
        "merchant_caravan" => known(
            "Traveling Merchants",
            "A caravan of exotic merchants arrives with rare goods",
            3,
            json!({"trade_prices": -20, "rare_items_available": true}),
        ),
        "dragon_sighting" => known(
            "Ancient Dragon Awakens",
            "An ancient dragon has been spotted terrorizing the countryside",
            10,
            json!({"danger_level": 50, "heroic_quests_available": true}),
        ),
        "festival" => known(
            "Harvest Festival",
            "The kingdom celebrates with a grand festival",
            2,
            json!({"happiness": 20, "trade_bonus": 10}),
        ),
        "portal_opening" => known(
            "Dimensional Rift",
            "A mysterious portal opens to another dimension",
            5,
            json!({"magic_instability": 30, "rare_creatures_spawn": true}),
        ),
        other => WorldEvent {
            event_type: other.to_string(),
            name: title_case(other),
            description: format!("A {} event occurs", other.replace('_', " ")),
            duration: rand::rng().random_range(1..=5),
            effects: json!({}),
        },
    }
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn entity(entity_type: &str) -> Value {
    let mut rng = rand::rng();
    match entity_type {
        "merchant" => json!({"friendly": true, "trades": true}),
        "dragon" => json!({"friendly": false, "boss": true, "level": 50}),
        "wanderer" => json!({"friendly": true, "quest_giver": true}),
        "bandit" => json!({"friendly": false, "level": rng.random_range(5..=15)}),
        "treasure" => json!({"lootable": true}),
        "portal" => json!({"teleport": true}),
        _ => json!({}),
    }
}

/// Action parameters normally sit in a nested `parameters` object; a flat
/// argument map is accepted as well.
fn action_param<'a>(arguments: &'a ToolArgs, name: &str) -> Option<&'a Value> {
    arguments
        .get("parameters")
        .and_then(|p| p.get(name))
        .or_else(|| arguments.get(name))
}

fn action_str<'a>(arguments: &'a ToolArgs, name: &str) -> Option<&'a str> {
    action_param(arguments, name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn action_int(arguments: &ToolArgs, name: &str) -> Option<i64> {
    action_param(arguments, name).and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

fn random_of(choices: &[&'static str]) -> &'static str {
    choices.choose(&mut rand::rng()).copied().unwrap_or_default()
}

pub struct GameWorldAgent {
    store: Arc<dyn MemoryStore>,
}

impl GameWorldAgent {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GameWorldAgent {
    fn name(&self) -> &str {
        "GameWorld"
    }

    fn description(&self) -> &str {
        "Tracks the state of the game world: time of day, day count, weather, \
         season, faction standings, active events, threats and stability. Use \
         get_world_state before describing a scene, advance_time when the player \
         rests or travels, change_weather for dramatic shifts, update_faction when \
         the player helps or wrongs a faction, trigger_event for world-shaking \
         happenings and spawn_entity to place a creature or object nearby."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [
                        "get_world_state", "advance_time", "change_weather",
                        "update_faction", "trigger_event", "spawn_entity"
                    ],
                    "description": "What to do with the world"
                },
                "parameters": {
                    "type": "object",
                    "properties": {
                        "hours": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Hours to advance (advance_time, default 1)"
                        },
                        "weather": {
                            "type": "string",
                            "enum": WEATHER_TYPES,
                            "description": "New weather (change_weather, random if omitted)"
                        },
                        "faction": {
                            "type": "string",
                            "description": "Faction whose standing changes (update_faction)"
                        },
                        "change": {
                            "type": "integer",
                            "description": "Standing change, positive or negative (update_faction)"
                        },
                        "event_type": {
                            "type": "string",
                            "enum": WORLD_EVENTS,
                            "description": "Event to trigger (trigger_event, random if omitted)"
                        },
                        "type": {
                            "type": "string",
                            "enum": ENTITY_TYPES,
                            "description": "Entity to spawn (spawn_entity, random if omitted)"
                        },
                        "location": {
                            "type": "object",
                            "properties": {"x": {"type": "integer"}, "y": {"type": "integer"}},
                            "description": "Where to spawn (spawn_entity, random if omitted)"
                        }
                    }
                },
                "user_guid": {
                    "type": "string",
                    "description": "Player whose world is affected"
                }
            },
            "required": ["action"]
        })
    }

    fn user_scoped(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: ToolArgs) -> Result<Option<String>, ToolError> {
        let key = match context_key_from_args(&arguments) {
            Ok(key) => key,
            Err(e) => return Ok(Some(error_payload(e))),
        };
        let action = arguments
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("get_world_state");

        let mut document = self.store.read(&key).await?;
        if !document.is_object() {
            document = json!({});
        }
        let existing: Option<WorldState> = document
            .get("world_state")
            .and_then(|w| serde_json::from_value(w.clone()).ok());

        let (state, reply) = match action {
            "get_world_state" => {
                let state = existing.unwrap_or_default();
                let reply = json!({"status": "success", "world_state": state});
                (state, reply)
            }
            "advance_time" => {
                let Some(mut state) = existing else {
                    return Ok(Some(error_payload("No world state found")));
                };
                let hours = action_param(&arguments, "hours")
                    .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
                    .map_or(1, |h| u32::try_from(h).unwrap_or(u32::MAX).min(MAX_ADVANCE_HOURS));
                let days = state.advance(hours);
                let reply = json!({
                    "status": "success",
                    "message": format!("Advanced time by {hours} hours"),
                    "days_passed": days,
                    "world_state": state,
                });
                (state, reply)
            }
            "change_weather" => {
                let mut state = existing.unwrap_or_default();
                let requested = action_str(&arguments, "weather")
                    .map(str::to_ascii_lowercase)
                    .filter(|w| WEATHER_TYPES.contains(&w.as_str()));
                let old_weather = std::mem::replace(
                    &mut state.weather,
                    requested.unwrap_or_else(|| random_of(WEATHER_TYPES).to_string()),
                );
                let reply = json!({
                    "status": "success",
                    "message": format!("Weather changed to {}", state.weather),
                    "old_weather": old_weather,
                    "new_weather": state.weather,
                    "weather_effects": weather_effects(&state.weather),
                    "world_state": state,
                });
                (state, reply)
            }
            "update_faction" => {
                let Some(faction) = action_str(&arguments, "faction") else {
                    return Ok(Some(error_payload("No faction specified")));
                };
                let mut state = existing.unwrap_or_default();
                let change = action_int(&arguments, "change").unwrap_or(0);
                let (old, new) = state.shift_standing(faction, change);
                let reply = json!({
                    "status": "success",
                    "faction": faction,
                    "old_standing": old,
                    "new_standing": new,
                    "consequences": consequences(faction, new),
                    "world_state": state,
                });
                (state, reply)
            }
            "trigger_event" => {
                let mut state = existing.unwrap_or_default();
                let event_type = action_str(&arguments, "event_type")
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(|| random_of(WORLD_EVENTS).to_string());
                let event = world_event(&event_type);
                state.apply_event(event.clone());
                let reply = json!({
                    "status": "success",
                    "event": event,
                    "world_stability": state.world_stability,
                    "world_state": state,
                });
                (state, reply)
            }
            "spawn_entity" => {
                let entity_type = action_str(&arguments, "type")
                    .filter(|t| *t != "random")
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(|| random_of(ENTITY_TYPES).to_string());
                let location = action_param(&arguments, "location")
                    .filter(|l| l.is_object())
                    .cloned()
                    .unwrap_or_else(|| {
                        let mut rng = rand::rng();
                        json!({"x": rng.random_range(0..=100), "y": rng.random_range(0..=100)})
                    });
                let mut spawned = entity(&entity_type);
                spawned["type"] = json!(entity_type);
                spawned["location"] = location;
                spawned["id"] = json!(format!(
                    "{entity_type}_{}",
                    chrono::Utc::now().timestamp_millis()
                ));
                // spawns are transient and leave the stored world untouched
                return Ok(Some(json!({"status": "success", "entity": spawned}).to_string()));
            }
            _ => return Ok(Some(error_payload("Unknown action"))),
        };

        document["world_state"] = serde_json::to_value(&state).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        self.store.write(&key, &document).await?;

        debug!(key = %key, action, "World state updated");
        Ok(Some(reply.to_string()))
    }
}
