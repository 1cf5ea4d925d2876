//! `questweaver agents`: show what discovery finds right now.

use questweaver_tools::Discovery;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = questweaver_memory::build_from_config(&config);
    let registry = Discovery::new(store, config.storage.resolved_scratch_dir())
        .with_default_agents()
        .discover()
        .await;

    println!("Agents ({})", registry.len());
    println!("==========");

    if registry.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for name in registry.names() {
        let Some(tool) = registry.get(name) else {
            continue;
        };
        let origin = registry.origin(name).unwrap_or("unknown");
        let scope = if questweaver_core::is_identity_sensitive(tool) {
            "per-user"
        } else {
            "shared"
        };
        println!("  {name:<20} {scope:<9} {origin}");
        println!("  {:<20} {}", "", tool.description());
    }

    Ok(())
}
