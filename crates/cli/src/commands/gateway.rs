//! `wayfarer gateway`: Start the HTTP API server.

use wayfarer_config::AppConfig;

pub async fn run(
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Wayfarer Gateway");
    println!("   Listening:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Profile:       {}", config.agent.profile);
    println!("   Chat timeout:  {}s", config.gateway.chat_timeout_secs);

    wayfarer_gateway::start(config).await?;

    Ok(())
}
