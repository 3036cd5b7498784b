//! `chatrelay gateway`: Start the HTTP server.

use chatrelay_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ChatRelay Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!("   Memory:    {}", config.memory.backend);
    println!("   Endpoints: /api/chat  /api/chat/stream  /api/rag/chat/stream  /health");

    chatrelay_gateway::start(config).await?;

    Ok(())
}
