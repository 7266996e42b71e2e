//! Server settings, parsed from the command line by the binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    pub tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout_secs: u64,

    /// Ticks between full state rebroadcasts
    #[arg(long, default_value = "30")]
    pub snapshot_interval: u64,

    /// ASCII map file; the built-in demo map is used when absent
    #[arg(long)]
    pub map: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tick_rate: u32,
    pub max_clients: usize,
    pub client_timeout: Duration,
    pub snapshot_interval: u64,
    pub map: Option<PathBuf>,
    /// Actions buffered per client before the oldest are dropped.
    pub max_pending_actions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 30,
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
            snapshot_interval: 30,
            map: None,
            max_pending_actions: 64,
        }
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate.max(1),
            max_clients: args.max_clients,
            client_timeout: Duration::from_secs(args.client_timeout_secs),
            snapshot_interval: args.snapshot_interval,
            map: args.map,
            ..Self::default()
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    /// True on ticks that should carry a full state rebroadcast.
    pub fn is_snapshot_tick(&self, tick: u64) -> bool {
        self.snapshot_interval > 0 && tick % self.snapshot_interval == 0
    }
}
