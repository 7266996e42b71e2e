//! # Tile Sync Client
//!
//! Headless client for the tile movement engine. It predicts its own entity
//! locally so input takes effect at once, and reconciles that prediction with
//! the authoritative broadcasts the server sends back.
//!
//! ## Prediction and Reconciliation
//!
//! Each input is resolved against the client's observed world with the same
//! engine the server runs, then queued until acknowledged. When a broadcast
//! for the local entity arrives, acknowledged actions leave the queue and the
//! rest are replayed on top of the server's state. A replay that fails or ends
//! on a different tile snaps the prediction. A broadcast carrying
//! `reset_queue` drops all prediction outright.
//!
//! Actions the server rejects are never answered. If the oldest pending action
//! stays unacknowledged for `ack_timeout_frames` frames the queue is dropped
//! and the client falls back to the last authoritative state.
//!
//! ## Module Organization
//!
//! - `config`: command line arguments and runtime settings
//! - `game`: observed world, predicted state, pending queue, reconciliation
//! - `input`: scripted or random-walk movement input
//! - `network`: UDP connection and the frame loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         script: Some("R R U UL".to_string()),
//!         ..ClientConfig::default()
//!     };
//!     let mut client = Client::new(&config).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
