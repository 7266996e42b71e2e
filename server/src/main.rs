use clap::Parser;
use log::info;
use server::config::{ServerArgs, ServerConfig};
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(ServerArgs::parse());

    info!("Starting tile sync server...");
    info!("Tick rate: {}Hz", config.tick_rate);
    match &config.map {
        Some(path) => info!("Loading map from {}", path.display()),
        None => info!("Using built-in demo map"),
    }

    let mut server = Server::new(config).await?;

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
