//! `questweaver init`: first-time setup.
//!
//! Writes `~/.questweaver/config.toml` when missing, then seeds the file
//! store with sample declarative agents and a starting world document so a
//! fresh install has something to discover.

use questweaver_config::{AppConfig, StorageBackend};
use questweaver_core::memory::{ArtifactNamespace, ContextKey, MemoryStore};
use questweaver_memory::FileStore;
use serde_json::{Value, json};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("QuestWeaver: First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let config = super::load_config()?;
    if config.storage.backend != StorageBackend::File {
        println!("\n  Storage backend is in-process; nothing to seed.\n");
        return Ok(());
    }

    let root = config.storage.resolved_root();
    let store = FileStore::new(&root);
    println!("  Memory store: {}", root.display());

    for (namespace, file, manifest) in sample_agents() {
        if store.read_artifact(namespace, file).await?.is_some() {
            println!("  Agent exists: {}/{file}", namespace.as_str());
            continue;
        }
        store
            .put_artifact(namespace, file, &serde_json::to_vec_pretty(&manifest)?)
            .await?;
        println!("  Seeded agent: {}/{file}", namespace.as_str());
    }

    let shared = store.read(&ContextKey::Shared).await?;
    if shared.as_object().is_none_or(|doc| doc.is_empty()) {
        store.write(&ContextKey::Shared, &starting_world()).await?;
        println!("  Seeded shared world lore");
    }

    println!("\n  Next steps:");
    println!("   1. Add your API key to {} or export AZURE_OPENAI_API_KEY", config_path.display());
    println!("   2. Run: questweaver agents");
    println!("   3. Run: questweaver chat\n");

    Ok(())
}

fn sample_agents() -> Vec<(ArtifactNamespace, &'static str, Value)> {
    vec![
        (
            ArtifactNamespace::Agents,
            "NPCDialogue_agent.json",
            json!({
                "name": "NPCDialogue",
                "description": "Voices a non-player character. Give the NPC's name, their mood, and what they say.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "npc_name": {"type": "string"},
                        "mood": {"type": "string", "enum": ["friendly", "wary", "hostile", "afraid"]},
                        "line": {"type": "string"}
                    },
                    "required": ["npc_name", "line"]
                },
                "user_scoped": true,
                "template": "{\"event\":\"npc_dialogue\",\"npc\":\"{{npc_name}}\",\"mood\":\"{{mood}}\",\"dialogue\":\"{{line}}\"}"
            }),
        ),
        (
            ArtifactNamespace::MultiAgents,
            "QuestGenerator_agent.json",
            json!({
                "name": "QuestGenerator",
                "description": "Offers the player a quest that grows out of the current scene.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "theme": {"type": "string"},
                        "difficulty": {"type": "string", "enum": ["easy", "normal", "hard", "legendary"]}
                    },
                    "required": ["theme"]
                },
                "template": "{\"event\":\"quest_offer\",\"theme\":\"{{theme}}\",\"difficulty\":\"{{difficulty}}\"}"
            }),
        ),
        (
            ArtifactNamespace::MultiAgents,
            "CombatNarrator_agent.json",
            json!({
                "name": "CombatNarrator",
                "description": "Reports one combat beat: who struck whom, with what, and for how much damage. Narrate the beat yourself from the result.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "combat_event": {
                            "type": "string",
                            "enum": ["attack", "defend", "critical", "miss", "death", "victory", "special_move", "environmental"]
                        },
                        "attacker": {"type": "string"},
                        "defender": {"type": "string"},
                        "weapon": {"type": "string"},
                        "damage": {"type": "number"}
                    },
                    "required": ["combat_event"]
                },
                "user_scoped": true,
                "template": "{\"event\":\"combat\",\"combat_event\":\"{{combat_event}}\",\"attacker\":\"{{attacker}}\",\"defender\":\"{{defender}}\",\"weapon\":\"{{weapon}}\",\"damage\":{{damage}}}"
            }),
        ),
    ]
}

fn starting_world() -> Value {
    json!({
        "lore": "The Runecraft isles drift above a sea of mist. Old runestones hum where the ley lines cross.",
        "factions": {
            "Wardens of the Ley": "guard the runestones",
            "Mistborn Corsairs": "raid the outer isles"
        },
        "global_events": []
    })
}
