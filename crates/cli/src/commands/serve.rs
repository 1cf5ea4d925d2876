//! `questweaver serve`: start the HTTP gateway.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("QuestWeaver Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Endpoint:  POST /api/orchestrate");

    questweaver_gateway::start(config).await?;

    Ok(())
}
