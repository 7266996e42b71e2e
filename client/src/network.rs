use crate::config::ClientConfig;
use crate::game::{ClientGameState, ReconcileOutcome};
use crate::input::InputManager;
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Frames between two status lines.
const STATUS_INTERVAL: u64 = 120;

/// Frames without outgoing packets before a heartbeat is sent.
const HEARTBEAT_INTERVAL: u64 = 30;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,
    frames_since_send: u64,

    game_state: ClientGameState,
    input_manager: InputManager,

    fake_ping_ms: u64,
    help_intent: bool,
}

impl Client {
    pub async fn new(config: &ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = config.server.parse()?;

        let input_manager = match &config.script {
            Some(script) => InputManager::scripted(script, config.step_frames)?,
            None => InputManager::wander(config.step_frames),
        };

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            frames_since_send: 0,
            game_state: ClientGameState::new(config.ack_timeout_frames),
            input_manager,
            fake_ping_ms: config.fake_ping_ms,
            help_intent: config.help_intent,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            help_intent: self.help_intent,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = packet.encode()?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id, entity } => {
                info!("Connected! Client ID: {}, entity: {}", client_id, entity);
                self.client_id = Some(client_id);
                self.connected = true;
                self.game_state.set_local(entity);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            packet => {
                if let Some(outcome) = self.game_state.handle_packet(packet) {
                    match outcome {
                        ReconcileOutcome::Snapped { .. } | ReconcileOutcome::Reset => {
                            debug!("Local prediction corrected: {:?}", outcome)
                        }
                        ReconcileOutcome::Accepted | ReconcileOutcome::Ignored => {}
                    }
                }
            }
        }
    }

    async fn send_input(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(flags) = self.input_manager.update() else {
            return Ok(());
        };
        if !self.connected {
            return Ok(());
        }

        if let Some(packet) = self.game_state.apply_local_action(flags) {
            self.send_packet(&packet).await?;
            self.frames_since_send = 0;
        }
        Ok(())
    }

    /// Keeps the connection alive while input produces nothing to send.
    async fn send_heartbeat(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }
        self.frames_since_send += 1;
        if self.frames_since_send < HEARTBEAT_INTERVAL {
            return Ok(());
        }
        self.frames_since_send = 0;
        self.send_packet(&Packet::Heartbeat).await
    }

    fn log_status(&mut self) {
        let renders = self.game_state.take_render_states();
        if self.game_state.frame() % STATUS_INTERVAL != 0 {
            return;
        }

        let stats = self.game_state.stats;
        let local = self
            .game_state
            .predicted_world_position()
            .map(|p| p.round_to_tile().to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "Frame {}: at {}, {} visible, {} pending, {:?}, snapped {}, resets {}, stale {}",
            self.game_state.frame(),
            local,
            renders.len(),
            self.game_state.pending.len(),
            self.game_state.sync_state,
            stats.snapped,
            stats.resets,
            stats.stale_drops
        );
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(Duration::from_millis(16));
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match Packet::decode(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    self.game_state.update();

                    if let Err(e) = self.send_input().await {
                        error!("Error sending input: {}", e);
                    }
                    if let Err(e) = self.send_heartbeat().await {
                        error!("Error sending heartbeat: {}", e);
                    }

                    self.log_status();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, disconnecting");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
