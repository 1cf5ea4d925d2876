//! `questweaver chat`: interactive or single-message play.

use std::io::Write;
use std::sync::Arc;

use questweaver_agent::{DispatchResult, Orchestrator, TurnRequest};
use questweaver_config::AppConfig;
use questweaver_core::event::DomainEvent;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::debug;

pub async fn run(
    message: Option<String>,
    user: Option<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    AZURE_OPENAI_API_KEY  (with AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_DEPLOYMENT_NAME)");
        eprintln!("    OPENAI_API_KEY        (with QUESTWEAVER_PROVIDER=openai)");
        eprintln!("    QUESTWEAVER_API_KEY   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let providers = questweaver_providers::build_from_config(&config);
    let provider = providers.default().ok_or("No default provider configured")?;
    let store = questweaver_memory::build_from_config(&config);
    let orchestrator = Orchestrator::new(provider, store, &config);

    if verbose {
        tokio::spawn(log_events(orchestrator.event_bus().subscribe()));
    }

    let mut session = orchestrator.session().await;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = session.turn(request(msg, &user, Vec::new())).await;
        eprint!("\r              \r");
        print_result(&outcome.result);
        return Ok(());
    }

    println!();
    println!("  QuestWeaver: Interactive Mode");
    println!();
    println!("  Game master: {}", config.persona.assistant_name);
    println!("  Provider:    {}", config.default_provider);
    println!("  Model:       {}", orchestrator.model());
    println!("  Agents:      {}", session.registry().names().join(", "));
    if let Some(user) = &user {
        println!("  Playing as:  {user}");
    }
    println!();
    println!("  Type what your character does and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Value> = Vec::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let outcome = session.turn(request(input.to_string(), &user, history.clone())).await;
        eprint!("\r     \r");
        println!();
        print_result(&outcome.result);

        history.push(json!({"role": "user", "content": input}));
        history.push(json!({"role": "assistant", "content": outcome.result.narrative}));
    }

    println!();
    println!("  Farewell, adventurer.");
    println!();

    Ok(())
}

fn request(input: String, user: &Option<String>, history: Vec<Value>) -> TurnRequest {
    let request = TurnRequest::new(input).with_history(history);
    match user {
        Some(guid) => request.with_user_guid(guid.clone()),
        None => request,
    }
}

fn print_result(result: &DispatchResult) {
    for line in result.narrative.lines() {
        println!("  GM > {line}");
    }
    if result.game_data != "{}" {
        println!("  [game data] {}", result.game_data);
    }
    for log in &result.agent_logs {
        println!("  [agent] {log}");
    }
    println!();
}

async fn log_events(mut events: Receiver<Arc<DomainEvent>>) {
    loop {
        match events.recv().await {
            Ok(event) => debug!(event = ?event, "Domain event"),
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
