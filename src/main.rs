use anyhow::Result;
use routing_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry);

    info!("Starting Routing Core");
    info!(backend = ?config.store, addr = %config.http_addr(), "Configuration loaded");

    server::run(config, prometheus_handle).await
}
