//! # Tile Sync Server
//!
//! Authoritative side of the tile movement engine. The server owns the real
//! entity states, validates every movement request against them and broadcasts
//! the result so clients can reconcile their predictions.
//!
//! ## Module Organization
//!
//! - `config`: command line arguments and runtime settings
//! - `client_manager`: connections, timeouts and per-client action queues
//! - `store`: per-entity locked storage of authoritative states
//! - `game`: validation, movement transactions, pulls, doors and broadcasts
//! - `collaborators`: status effects and container lookups the rules consult
//! - `events`: game events produced by committed changes
//! - `network`: UDP tasks and the tick loop
//!
//! ## Tick Flow
//!
//! Packets are handled as they arrive but movement is only queued. Each tick
//! the loop takes at most one action per client, applies them in arrival
//! order, advances moving frames, opens doors that were bumped and flushes the
//! resulting broadcasts. Every `snapshot_interval` ticks the full state of all
//! entities is sent again so lost datagrams heal on their own.
//!
//! Rejected actions are never answered. The client notices through the
//! sequence number in the next broadcast and snaps.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collaborators;
pub mod config;
pub mod events;
pub mod game;
pub mod network;
pub mod store;
