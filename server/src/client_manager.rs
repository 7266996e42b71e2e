//! Client connection management and action queuing for the server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Buffering of movement actions until the next tick
//! - Picking at most one action per client per tick, in arrival order
//! - Client capacity management and address tracking
//!
//! Actions are only queued here. Validation against the authoritative state
//! happens in the game module when the tick loop takes them.

use log::{info, warn};
use shared::{EntityId, MoveAction};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A movement action waiting for the next tick.
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub action: MoveAction,
    pub received: Instant,
}

/// Represents a connected client and the actions it has sent
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Entity this client controls, once spawned
    pub entity: Option<EntityId>,
    /// Buffered actions, ordered by sequence
    pub pending_actions: Vec<QueuedAction>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            entity: None,
            pending_actions: Vec::new(),
        }
    }

    /// Buffers an action, keeping the queue sorted by sequence so datagrams
    /// that arrive out of order are still applied in order. A later action
    /// with the same sequence replaces the earlier one, so a door bump is
    /// superseded by the move that follows it. The oldest actions are dropped
    /// once `limit` is reached.
    pub fn add_action(&mut self, action: MoveAction, limit: usize) {
        self.last_seen = Instant::now();
        if let Some(queued) = self
            .pending_actions
            .iter_mut()
            .find(|queued| queued.action.sequence == action.sequence)
        {
            queued.action = action;
            return;
        }
        self.pending_actions.push(QueuedAction {
            action,
            received: Instant::now(),
        });
        self.pending_actions.sort_by_key(|queued| queued.action.sequence);

        if self.pending_actions.len() > limit {
            let excess = self.pending_actions.len() - limit;
            warn!(
                "Client {} has too many queued actions, dropping {}",
                self.id, excess
            );
            self.pending_actions.drain(..excess);
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their queued actions
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    max_pending_actions: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize, max_pending_actions: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            max_pending_actions,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client and returns the entity it controlled, if any.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Option<EntityId>> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client.entity)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn set_entity(&mut self, client_id: u32, entity: EntityId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.entity = Some(entity);
        }
    }

    pub fn entity_of(&self, client_id: u32) -> Option<EntityId> {
        self.clients.get(&client_id).and_then(|client| client.entity)
    }

    /// Any packet counts as a sign of life.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Buffers an action for a client. Returns false if the client ID is invalid.
    pub fn add_action(&mut self, client_id: u32, action: MoveAction) -> bool {
        let limit = self.max_pending_actions;
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.add_action(action, limit);
            true
        } else {
            false
        }
    }

    /// Takes the lowest-sequence action of every client, ordered by arrival.
    ///
    /// One action per client per tick keeps each entity single-writer; the
    /// rest wait for later ticks.
    pub fn take_tick_actions(&mut self) -> Vec<(u32, MoveAction)> {
        let mut taken: Vec<(u32, QueuedAction)> = self
            .clients
            .values_mut()
            .filter(|client| !client.pending_actions.is_empty())
            .map(|client| (client.id, client.pending_actions.remove(0)))
            .collect();

        taken.sort_by_key(|(_, queued)| queued.received);
        taken
            .into_iter()
            .map(|(client_id, queued)| (client_id, queued.action))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.clients
            .values()
            .map(|client| client.pending_actions.len())
            .sum()
    }

    /// Removes clients that have been silent for longer than `timeout`.
    ///
    /// Returns the removed client IDs with the entities they controlled.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(u32, Option<EntityId>)> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|client_id| {
                self.remove_client(&client_id)
                    .map(|entity| (client_id, entity))
            })
            .collect()
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MoveFlags, MoveKey};
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn action(sequence: u32) -> MoveAction {
        MoveAction::new(1, sequence, MoveFlags::from_keys(&[MoveKey::Right]))
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.entity, None);
        assert!(client.pending_actions.is_empty());
    }

    #[test]
    fn test_client_orders_actions_by_sequence() {
        let mut client = Client::new(1, test_addr());

        client.add_action(action(2), 8);
        client.add_action(action(1), 8);
        client.add_action(action(2), 8);

        assert_eq!(client.pending_actions.len(), 2);
        assert_eq!(client.pending_actions[0].action.sequence, 1);
        assert_eq!(client.pending_actions[1].action.sequence, 2);
    }

    #[test]
    fn test_later_action_replaces_same_sequence() {
        let mut client = Client::new(1, test_addr());
        let bump = MoveAction::new(1, 1, MoveFlags::from_keys(&[MoveKey::Right]));
        let mv = MoveAction::new(1, 1, MoveFlags::from_keys(&[MoveKey::Up]));

        client.add_action(bump, 8);
        client.add_action(mv, 8);

        assert_eq!(client.pending_actions.len(), 1);
        assert_eq!(client.pending_actions[0].action, mv);
    }

    #[test]
    fn test_client_queue_is_bounded() {
        let mut client = Client::new(1, test_addr());
        for sequence in 1..=5 {
            client.add_action(action(sequence), 3);
        }

        let sequences: Vec<u32> = client
            .pending_actions
            .iter()
            .map(|queued| queued.action.sequence)
            .collect();
        assert_eq!(sequences, vec![3, 4, 5]);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1, 8);

        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_returns_entity() {
        let mut manager = ClientManager::new(2, 8);
        let client_id = manager.add_client(test_addr()).unwrap();
        manager.set_entity(client_id, 42);

        assert_eq!(manager.entity_of(client_id), Some(42));
        assert_eq!(manager.remove_client(&client_id), Some(Some(42)));
        assert_eq!(manager.remove_client(&client_id), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2, 8);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
        assert_eq!(manager.addr_of(client_id1), Some(test_addr()));
    }

    #[test]
    fn test_add_action_to_nonexistent_client() {
        let mut manager = ClientManager::new(2, 8);
        assert!(!manager.add_action(999, action(1)));
    }

    #[test]
    fn test_one_action_per_client_per_tick() {
        let mut manager = ClientManager::new(3, 8);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        manager.add_action(client_id1, action(1));
        manager.add_action(client_id1, action(2));
        std::thread::sleep(Duration::from_millis(2));
        manager.add_action(client_id2, action(1));

        let first = manager.take_tick_actions();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0], (client_id1, action(1)));
        assert_eq!(first[1], (client_id2, action(1)));

        let second = manager.take_tick_actions();
        assert_eq!(second, vec![(client_id1, action(2))]);
        assert_eq!(manager.pending_count(), 0);
        assert!(manager.take_tick_actions().is_empty());
    }

    #[test]
    fn test_check_timeouts_reports_entities() {
        let mut manager = ClientManager::new(2, 8);
        let client_id = manager.add_client(test_addr()).unwrap();
        manager.set_entity(client_id, 7);

        assert!(manager.check_timeouts(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            manager.check_timeouts(Duration::from_millis(1)),
            vec![(client_id, Some(7))]
        );
        assert!(manager.is_empty());
    }
}
