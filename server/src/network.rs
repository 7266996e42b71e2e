//! Server network layer handling UDP communications and tick loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{EntityTraits, Packet, SyncError, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        entity: Option<shared::EntityId>,
    },
    /// Stops the tick loop after telling clients.
    Shutdown,
}

/// Messages sent from the tick loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
}

/// Main server coordinating networking and the authoritative simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    config: ServerConfig,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let game_state = match &config.map {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await?;
                GameState::from_map(&text)?
            }
            None => GameState::demo()?,
        };
        Self::with_game(config, game_state).await
    }

    /// Binds the socket around an already built world.
    pub async fn with_game(
        config: ServerConfig,
        game_state: GameState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.max_pending_actions,
            ))),
            game_state,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = Packet::decode(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that turns Ctrl+C into a shutdown message
    async fn spawn_signal_handler(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    if let Err(e) = server_tx.send(ServerMessage::Shutdown) {
                        error!("Failed to send shutdown message: {}", e);
                    }
                }
                Err(e) => error!("Unable to listen for Ctrl+C: {}", e),
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for (client_id, entity) in timed_out {
                    info!("Client {} timed out", client_id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id, entity })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet.encode()?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Client id and controlled entity of the sender, if connected.
    async fn sender_of(&self, addr: SocketAddr) -> Option<(u32, Option<shared::EntityId>)> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        clients.touch(client_id);
        Some((client_id, clients.entity_of(client_id)))
    }

    fn drop_entity(&mut self, entity: Option<shared::EntityId>) {
        if let Some(entity) = entity {
            self.game_state.despawn(entity);
        }
    }

    /// Processes incoming packets. Movement is only queued; it is applied on
    /// the next tick.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                help_intent,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                let existing = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|existing_id| clients.remove_client(&existing_id))
                };
                if let Some(entity) = existing {
                    info!("Replacing existing connection from {}", addr);
                    self.drop_entity(entity);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };
                let Some(client_id) = client_id else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                };

                let Some(spawn) = self.game_state.find_spawn_tile() else {
                    warn!("No free spawn tile for client {}", client_id);
                    self.clients.write().await.remove_client(&client_id);
                    let response = Packet::Disconnected {
                        reason: "No free spawn point".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                };

                let traits = EntityTraits::player().with_help_intent(help_intent);
                let entity = self
                    .game_state
                    .spawn(Some(client_id), traits, spawn.to_vector());
                self.clients.write().await.set_entity(client_id, entity);

                self.send_packet(Packet::Connected { client_id, entity }, addr);
                for packet in self.game_state.sync_packets() {
                    self.send_packet(packet, addr);
                }
            }

            Packet::MoveAction(action) => {
                if let Some((client_id, _)) = self.sender_of(addr).await {
                    let mut clients = self.clients.write().await;
                    clients.add_action(client_id, action);
                }
            }

            Packet::StartPull { target } => {
                if let Some((_, Some(entity))) = self.sender_of(addr).await {
                    match self.game_state.start_pull(entity, target) {
                        Ok(()) => {}
                        Err(SyncError::InvalidPull(reason)) => {
                            debug!("Pull {} -> {} refused: {}", entity, target, reason);
                            self.send_packet(Packet::PullRejected { reason }, addr);
                        }
                        Err(e) => debug!("Pull {} -> {} refused: {}", entity, target, e),
                    }
                }
            }

            Packet::StopPull => {
                if let Some((_, Some(entity))) = self.sender_of(addr).await {
                    if self.game_state.stop_pull(entity).is_none() {
                        self.game_state.break_free(entity);
                    }
                }
            }

            Packet::SetIntent { help } => {
                if let Some((_, Some(entity))) = self.sender_of(addr).await {
                    if let Err(e) = self.game_state.set_intent(entity, help) {
                        debug!("Intent change for {} ignored: {}", entity, e);
                    }
                }
            }

            Packet::Heartbeat => {
                if self.sender_of(addr).await.is_none() {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|client_id| clients.remove_client(&client_id))
                };
                if let Some(entity) = removed {
                    self.drop_entity(entity);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies at most one queued action per client. Rejections are only logged.
    async fn process_actions(&mut self) -> usize {
        let actions = {
            let mut clients = self.clients.write().await;
            clients.take_tick_actions()
        };

        let mut accepted = 0;
        for (client_id, action) in actions {
            match self.game_state.apply_server_action(Some(client_id), &action) {
                Ok(resolution) => {
                    accepted += 1;
                    debug!(
                        "Entity {} move #{} accepted ({:?})",
                        action.entity, action.sequence, resolution.bump
                    );
                }
                Err(e) => debug!(
                    "Dropped move #{} for entity {} from client {}: {}",
                    action.sequence, action.entity, client_id, e
                ),
            }
        }
        accepted
    }

    fn flush_outbox(&self) {
        for packet in self.game_state.drain_outbox() {
            self.broadcast_packet(packet, None);
        }
        for event in self.game_state.drain_events() {
            debug!("Event: {:?}", event);
        }
    }

    /// One authoritative tick: actions, frame motion, door updates, broadcasts.
    async fn tick(&mut self, dt: f32) {
        let accepted = self.process_actions().await;
        self.game_state.advance_frames(dt);
        let tick = self.game_state.end_tick();

        if self.config.is_snapshot_tick(tick) {
            for packet in self.game_state.snapshot_packets() {
                self.broadcast_packet(packet, None);
            }
        }
        self.flush_outbox();

        if tick % 60 == 0 {
            let client_count = self.clients.read().await.len();
            if client_count > 0 {
                debug!(
                    "Tick {}: {} clients, {} entities, {} accepted, {:.1}Hz",
                    tick,
                    client_count,
                    self.game_state.entity_count(),
                    accepted,
                    1.0 / dt.max(f32::EPSILON)
                );
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;
        self.spawn_signal_handler().await;

        let mut tick_interval = interval(self.config.tick_duration());
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { entity, .. }) => {
                            self.drop_entity(entity);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            let farewell = Packet::Disconnected {
                                reason: "Server shutting down".to_string(),
                            };
                            self.broadcast_packet(farewell, None);
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick(dt).await;
                },
            }
        }

        Ok(())
    }
}
