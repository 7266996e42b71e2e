use clap::Parser;
use client::config::{ClientArgs, ClientConfig};
use client::network;
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ClientConfig::from(ClientArgs::parse());

    info!("Starting client...");
    info!("Connecting to: {}", config.server);
    if config.fake_ping_ms > 0 {
        info!("Simulating {}ms latency", config.fake_ping_ms);
    }
    match &config.script {
        Some(script) => info!("Following script: {}", script),
        None => info!("No script given, wandering at random"),
    }

    let mut client = network::Client::new(&config).await?;

    client.run().await?;

    Ok(())
}
