//! Client-side view of the world, local prediction and reconciliation.
//!
//! The locally controlled entity is predicted: every input is resolved at once
//! against the observed world and queued until the server acknowledges it.
//! All other entities only ever show their last received authoritative state.

use log::{debug, info, warn};
use shared::{
    resolve, EntityId, EntityState, EntityTraits, FrameId, FrameInfo, FramePose, FrameRegistry,
    MoveAction, MoveFlags, Occupant, Packet, StateBroadcast, StepKind, SyncError, Tile, TileMap,
    TilePos, Vector2, View, WorldView,
};
use std::collections::{BTreeMap, VecDeque};

const OBSERVED: View = View::Observed;

/// Synchronisation phase of the local entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No authoritative state received yet.
    Unsynced,
    Synced,
    /// Predicted actions are waiting for acknowledgement.
    Reconciling,
}

/// A predicted action the server has not acknowledged yet.
#[derive(Debug, Clone, Copy)]
pub struct PendingAction {
    pub action: MoveAction,
    pub sent_frame: u64,
    pub predicted_tile: TilePos,
}

/// Last authoritative knowledge about one entity.
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    /// Unknown until the spawn announcement arrives.
    pub traits: Option<EntityTraits>,
    pub state: EntityState,
    /// The latest broadcast asked to skip interpolation.
    pub no_lerp: bool,
}

/// What a broadcast for the local entity did to the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Older than what we already have.
    Ignored,
    /// Replay reproduced the prediction.
    Accepted,
    /// Replay diverged or failed; the visual position jumps.
    Snapped {
        predicted: TilePos,
        authoritative: TilePos,
    },
    /// The server asked for all prediction to be dropped.
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub broadcasts: u64,
    pub ignored: u64,
    pub accepted: u64,
    pub snapped: u64,
    pub resets: u64,
    pub stale_drops: u64,
}

/// Position to draw an entity at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub entity: EntityId,
    pub world: Vector2,
    pub predicted: bool,
    pub no_lerp: bool,
}

pub struct ClientGameState {
    pub frames: FrameRegistry,
    pub tiles: TileMap,
    pub entities: BTreeMap<EntityId, RemoteEntity>,
    pub local: Option<EntityId>,
    pub predicted: Option<EntityState>,
    pub pending: VecDeque<PendingAction>,
    pub sync_state: SyncState,
    pub stats: ReconcileStats,
    /// Known pull edges, puller to pullee.
    pulls: BTreeMap<EntityId, EntityId>,
    frame: u64,
    ack_timeout_frames: u64,
    snap_local: bool,
}

impl WorldView for ClientGameState {
    fn frames(&self) -> &FrameRegistry {
        &self.frames
    }

    fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    fn occupants_at(&self, world_tile: TilePos, view: View) -> Vec<Occupant> {
        self.entities
            .iter()
            .filter_map(|(id, entity)| {
                let state = match (Some(*id) == self.local, &self.predicted) {
                    (true, Some(predicted)) => predicted,
                    _ => &entity.state,
                };
                let traits = entity.traits?;
                (state.world_tile(&self.frames, view)? == world_tile).then_some(Occupant {
                    id: *id,
                    traits,
                    moving: false,
                })
            })
            .collect()
    }
}

impl ClientGameState {
    pub fn new(ack_timeout_frames: u64) -> Self {
        Self {
            frames: FrameRegistry::new(),
            tiles: TileMap::new(),
            entities: BTreeMap::new(),
            local: None,
            predicted: None,
            pending: VecDeque::new(),
            sync_state: SyncState::Unsynced,
            stats: ReconcileStats::default(),
            pulls: BTreeMap::new(),
            frame: 0,
            ack_timeout_frames: ack_timeout_frames.max(1),
            snap_local: false,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Takes control of `entity`. Earlier prediction is discarded.
    pub fn set_local(&mut self, entity: EntityId) {
        self.local = Some(entity);
        self.predicted = None;
        self.pending.clear();
        self.sync_state = SyncState::Unsynced;
        if let Some(known) = self.entities.get(&entity) {
            if known.state.is_active() || known.state.move_number > 0 {
                self.predicted = Some(known.state);
                self.sync_state = SyncState::Synced;
            }
        }
    }

    pub fn local_traits(&self) -> EntityTraits {
        self.local
            .and_then(|id| self.entities.get(&id))
            .and_then(|entity| entity.traits)
            .unwrap_or_else(EntityTraits::player)
    }

    /// Authoritative state of the local entity as last received.
    pub fn authoritative_local(&self) -> Option<EntityState> {
        self.local
            .and_then(|id| self.entities.get(&id))
            .map(|entity| entity.state)
    }

    pub fn predicted_world_position(&self) -> Option<Vector2> {
        self.predicted?.world_position(&self.frames, OBSERVED)
    }

    pub fn is_being_pulled(&self) -> bool {
        self.local
            .is_some_and(|local| self.pulls.values().any(|pullee| *pullee == local))
    }

    pub fn pullee_of(&self, puller: EntityId) -> Option<EntityId> {
        self.pulls.get(&puller).copied()
    }

    /// Predicts one input for the local entity and returns the packet to send.
    ///
    /// Inputs that would not move the entity are not sent, except closed-door
    /// bumps, which the server needs to see to open the door. While being
    /// pulled the input breaks free instead of moving.
    pub fn apply_local_action(&mut self, flags: MoveFlags) -> Option<Packet> {
        let local = self.local?;
        let predicted = self.predicted?;

        if self.is_being_pulled() {
            self.pulls.retain(|_, pullee| *pullee != local);
            return Some(Packet::StopPull);
        }

        let traits = self.local_traits();
        let resolution =
            match resolve(&*self, &predicted, &flags, local, &traits, OBSERVED, StepKind::Input) {
                Ok(resolution) => resolution,
                Err(e) => {
                    debug!("Local input ignored: {}", e);
                    return None;
                }
            };

        let action = MoveAction::new(local, predicted.move_number.wrapping_add(1), flags);
        if !resolution.moved {
            return (resolution.bump == shared::BumpType::ClosedDoor)
                .then_some(Packet::MoveAction(action));
        }

        let predicted_tile = resolution
            .state
            .world_tile(&self.frames, OBSERVED)
            .unwrap_or_else(|| resolution.state.tile());
        self.predicted = Some(resolution.state.without_flags());
        self.pending.push_back(PendingAction {
            action,
            sent_frame: self.frame,
            predicted_tile,
        });
        self.sync_state = SyncState::Reconciling;
        Some(Packet::MoveAction(action))
    }

    /// Folds an authoritative state for the local entity into the prediction.
    ///
    /// Acknowledged actions leave the queue and the rest are replayed on top
    /// of the server state. Calling this again with the same state changes
    /// nothing.
    pub fn reconcile_client(&mut self, broadcast: &StateBroadcast) -> ReconcileOutcome {
        let Some(local) = self.local else {
            return ReconcileOutcome::Ignored;
        };
        self.stats.broadcasts += 1;

        let acked = broadcast.to_state();
        let known = self.entities.get(&local).map(|entity| entity.state);
        let synced = self.sync_state != SyncState::Unsynced;
        if synced && !acked.reset_queue {
            if let Some(known) = known {
                if acked.move_number < known.move_number {
                    self.stats.ignored += 1;
                    return ReconcileOutcome::Ignored;
                }
            }
        }

        let base = acked.without_flags();
        let entity = self.entities.entry(local).or_insert(RemoteEntity {
            traits: None,
            state: base,
            no_lerp: false,
        });
        entity.state = base;
        entity.no_lerp = acked.no_lerp;

        if acked.reset_queue || !synced {
            if !self.pending.is_empty() {
                debug!(
                    "Dropping {} pending actions on reset of entity {}",
                    self.pending.len(),
                    local
                );
            }
            self.pending.clear();
            self.predicted = Some(base);
            self.sync_state = SyncState::Synced;
            self.snap_local = true;
            self.stats.resets += 1;
            return ReconcileOutcome::Reset;
        }

        self.pending
            .retain(|pending| pending.action.sequence > acked.move_number);

        let previous = self
            .predicted
            .and_then(|state| state.world_tile(&self.frames, OBSERVED));
        let outcome = match self.replay(local, base) {
            Ok(rebuilt) => {
                self.predicted = Some(rebuilt);
                let rebuilt_tile = rebuilt.world_tile(&self.frames, OBSERVED);
                match (previous, rebuilt_tile) {
                    (Some(predicted), Some(authoritative)) if predicted != authoritative => {
                        ReconcileOutcome::Snapped {
                            predicted,
                            authoritative,
                        }
                    }
                    _ => ReconcileOutcome::Accepted,
                }
            }
            Err(e) => {
                debug!("Replay failed for entity {}: {}", local, e);
                self.pending.clear();
                self.predicted = Some(base);
                match (previous, base.world_tile(&self.frames, OBSERVED)) {
                    (Some(predicted), Some(authoritative)) => ReconcileOutcome::Snapped {
                        predicted,
                        authoritative,
                    },
                    _ => ReconcileOutcome::Reset,
                }
            }
        };

        match outcome {
            ReconcileOutcome::Snapped {
                predicted,
                authoritative,
            } => {
                let desync = SyncError::DesyncDetected {
                    entity: local,
                    predicted,
                    authoritative,
                };
                debug!("{}", desync);
                self.snap_local = true;
                self.stats.snapped += 1;
            }
            ReconcileOutcome::Reset => {
                self.snap_local = true;
                self.stats.resets += 1;
            }
            _ => self.stats.accepted += 1,
        }

        self.sync_state = if self.pending.is_empty() {
            SyncState::Synced
        } else {
            SyncState::Reconciling
        };
        outcome
    }

    /// Re-resolves every pending action on top of `base`. Any action that no
    /// longer moves the entity fails the whole replay.
    fn replay(&self, local: EntityId, base: EntityState) -> Result<EntityState, SyncError> {
        let traits = self.local_traits();
        let mut state = base;
        for pending in &self.pending {
            let resolution = resolve(
                self,
                &state,
                &pending.action.flags,
                local,
                &traits,
                OBSERVED,
                StepKind::Input,
            )?;
            if !resolution.moved {
                return Err(shared::RejectReason::Blocked(resolution.bump).into());
            }
            state = resolution.state.without_flags();
        }
        Ok(state)
    }

    /// Applies a broadcast for any entity. Broadcasts older than the stored
    /// state are dropped unless they reset the queue.
    pub fn apply_broadcast(&mut self, broadcast: &StateBroadcast) -> Option<ReconcileOutcome> {
        if Some(broadcast.entity) == self.local {
            return Some(self.reconcile_client(broadcast));
        }

        let state = broadcast.to_state();
        let entity = self
            .entities
            .entry(broadcast.entity)
            .or_insert(RemoteEntity {
                traits: None,
                state: state.without_flags(),
                no_lerp: state.no_lerp,
            });
        if state.move_number >= entity.state.move_number || state.reset_queue {
            entity.state = state.without_flags();
            entity.no_lerp = state.no_lerp;
        }
        None
    }

    /// Advances one client frame. Returns true when a stale queue was dropped.
    pub fn update(&mut self) -> bool {
        self.frame += 1;

        let Some(oldest) = self.pending.front() else {
            return false;
        };
        if self.frame.saturating_sub(oldest.sent_frame) <= self.ack_timeout_frames {
            return false;
        }

        let authoritative = self.authoritative_local();
        let acked = authoritative.map(|state| state.move_number).unwrap_or(0);
        if acked >= oldest.action.sequence {
            return false;
        }

        warn!(
            "Move #{} unacknowledged after {} frames, dropping {} pending actions",
            oldest.action.sequence,
            self.ack_timeout_frames,
            self.pending.len()
        );
        let predicted_tile = oldest.predicted_tile;
        self.pending.clear();
        self.predicted = authoritative;
        self.sync_state = SyncState::Synced;
        self.snap_local = true;
        self.stats.stale_drops += 1;

        if let (Some(local), Some(tile)) = (
            self.local,
            authoritative.and_then(|state| state.world_tile(&self.frames, OBSERVED)),
        ) {
            let desync = SyncError::DesyncDetected {
                entity: local,
                predicted: predicted_tile,
                authoritative: tile,
            };
            debug!("{}", desync);
        }
        true
    }

    pub fn handle_layout(&mut self, frames: &[FrameInfo], tiles: TileMap) {
        self.frames = FrameRegistry::from_infos(frames);
        self.tiles = tiles;
        info!(
            "Received world layout: {} frames, {} tiles",
            self.frames.len(),
            self.tiles.tile_count()
        );
    }

    pub fn handle_tile_changed(&mut self, frame: FrameId, tile: TilePos, kind: Tile) {
        self.tiles.set(frame, tile, kind);
    }

    /// Stores the pose as the client's observed one. The authoritative pose
    /// is not known on this side.
    pub fn handle_frame_update(&mut self, frame: FrameId, pose: FramePose) {
        if let Err(e) = self.frames.observe(frame, pose) {
            debug!("Ignoring frame update: {}", e);
        }
    }

    pub fn handle_spawn(&mut self, entity: EntityId, traits: EntityTraits) {
        self.entities
            .entry(entity)
            .and_modify(|known| known.traits = Some(traits))
            .or_insert(RemoteEntity {
                traits: Some(traits),
                state: EntityState::HIDDEN,
                no_lerp: true,
            });
    }

    /// Drops everything tracked for `entity`.
    pub fn handle_despawn(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
        self.pulls
            .retain(|puller, pullee| *puller != entity && *pullee != entity);
        if self.local == Some(entity) {
            info!("Controlled entity {} despawned", entity);
            self.local = None;
            self.predicted = None;
            self.pending.clear();
            self.sync_state = SyncState::Unsynced;
        }
    }

    pub fn handle_pull_update(&mut self, puller: EntityId, pullee: Option<EntityId>) {
        match pullee {
            Some(pullee) => {
                self.pulls.retain(|_, pulled| *pulled != pullee);
                self.pulls.insert(puller, pullee);
            }
            None => {
                self.pulls.remove(&puller);
            }
        }
    }

    /// Applies any world or entity packet. Connection packets are left to the
    /// network layer.
    pub fn handle_packet(&mut self, packet: Packet) -> Option<ReconcileOutcome> {
        match packet {
            Packet::WorldLayout { frames, tiles } => self.handle_layout(&frames, tiles),
            Packet::TileChanged { frame, tile, kind } => self.handle_tile_changed(frame, tile, kind),
            Packet::FrameUpdate { frame, pose } => self.handle_frame_update(frame, pose),
            Packet::StateBroadcast(broadcast) => return self.apply_broadcast(&broadcast),
            Packet::EntitySpawned { entity, traits } => self.handle_spawn(entity, traits),
            Packet::Despawned { entity } => self.handle_despawn(entity),
            Packet::PullUpdate { puller, pullee } => self.handle_pull_update(puller, pullee),
            Packet::PullRejected { reason } => info!("Pull refused: {}", reason),
            other => debug!("Packet not handled by game state: {:?}", other),
        }
        None
    }

    /// Changes the local help intent and returns the packet announcing it.
    pub fn set_help_intent(&mut self, help: bool) -> Packet {
        if let Some(entity) = self.local.and_then(|id| self.entities.get_mut(&id)) {
            let traits = entity.traits.get_or_insert_with(EntityTraits::player);
            traits.help_intent = help;
        }
        Packet::SetIntent { help }
    }

    /// Positions to draw this frame. The local entity uses its prediction.
    /// Snap requests are consumed.
    pub fn take_render_states(&mut self) -> Vec<RenderState> {
        let mut states = Vec::with_capacity(self.entities.len());
        for (id, entity) in self.entities.iter_mut() {
            let is_local = Some(*id) == self.local;
            let (state, no_lerp) = match (is_local, self.predicted) {
                (true, Some(predicted)) => (predicted, self.snap_local || entity.no_lerp),
                _ => (entity.state, entity.no_lerp),
            };
            entity.no_lerp = false;
            if let Some(world) = state.world_position(&self.frames, OBSERVED) {
                states.push(RenderState {
                    entity: *id,
                    world,
                    predicted: is_local && self.predicted.is_some(),
                    no_lerp,
                });
            }
        }
        self.snap_local = false;
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Direction, MoveKey};

    const ROOM: &str = "\
#######
#.....#
#.....#
#.....#
#######";

    fn state_at(x: f32, y: f32, move_number: u32) -> EntityState {
        let mut state = EntityState::at_world(Vector2::new(x, y), &FrameRegistry::new(), OBSERVED);
        state.move_number = move_number;
        state
    }

    fn broadcast(entity: EntityId, x: f32, y: f32, sequence: u32) -> StateBroadcast {
        StateBroadcast::from_state(entity, &state_at(x, y, sequence))
    }

    fn synced_client() -> ClientGameState {
        let mut game = ClientGameState::new(30);
        game.handle_layout(&[], TileMap::parse(ROOM).unwrap());
        game.handle_spawn(1, EntityTraits::player());
        game.set_local(1);
        let mut first = broadcast(1, 1.0, 1.0, 0);
        first.reset_queue = true;
        assert_eq!(game.reconcile_client(&first), ReconcileOutcome::Reset);
        game
    }

    fn right() -> MoveFlags {
        MoveFlags::from_keys(&[MoveKey::Right])
    }

    fn predicted_tile(game: &ClientGameState) -> TilePos {
        game.predicted_world_position().unwrap().round_to_tile()
    }

    #[test]
    fn test_prediction_queues_and_sends() {
        let mut game = synced_client();

        let packet = game.apply_local_action(right());
        match packet {
            Some(Packet::MoveAction(action)) => {
                assert_eq!(action.sequence, 1);
                assert_eq!(action.entity, 1);
            }
            other => panic!("Expected move action, got {:?}", other),
        }
        assert_eq!(predicted_tile(&game), TilePos::new(2, 1));
        assert_eq!(game.pending.len(), 1);
        assert_eq!(game.sync_state, SyncState::Reconciling);
    }

    #[test]
    fn test_blocked_input_is_not_sent() {
        let mut game = synced_client();
        let left = MoveFlags::from_keys(&[MoveKey::Left]);

        assert!(game.apply_local_action(left).is_none());
        assert!(game.pending.is_empty());
        assert_eq!(predicted_tile(&game), TilePos::new(1, 1));
    }

    #[test]
    fn test_ack_replays_remaining() {
        let mut game = synced_client();
        game.apply_local_action(right());
        game.apply_local_action(right());
        game.apply_local_action(right());
        assert_eq!(predicted_tile(&game), TilePos::new(4, 1));

        let outcome = game.reconcile_client(&broadcast(1, 2.0, 1.0, 1));
        assert_eq!(outcome, ReconcileOutcome::Accepted);
        assert_eq!(game.pending.len(), 2);
        assert_eq!(predicted_tile(&game), TilePos::new(4, 1));
        assert_eq!(game.sync_state, SyncState::Reconciling);

        game.reconcile_client(&broadcast(1, 4.0, 1.0, 3));
        assert!(game.pending.is_empty());
        assert_eq!(game.sync_state, SyncState::Synced);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut game = synced_client();
        game.apply_local_action(right());
        game.apply_local_action(right());

        let ack = broadcast(1, 2.0, 1.0, 1);
        game.reconcile_client(&ack);
        let first = (game.predicted, game.pending.len());
        game.reconcile_client(&ack);
        assert_eq!((game.predicted, game.pending.len()), first);
    }

    #[test]
    fn test_divergent_ack_snaps() {
        let mut game = synced_client();
        game.apply_local_action(right());

        // the server put us somewhere else entirely
        let outcome = game.reconcile_client(&broadcast(1, 1.0, 3.0, 1));
        assert_eq!(
            outcome,
            ReconcileOutcome::Snapped {
                predicted: TilePos::new(2, 1),
                authoritative: TilePos::new(1, 3),
            }
        );
        assert_eq!(predicted_tile(&game), TilePos::new(1, 3));
        assert_eq!(game.stats.snapped, 1);
        let renders = game.take_render_states();
        assert!(renders[0].no_lerp);
        assert!(!game.take_render_states()[0].no_lerp);
    }

    #[test]
    fn test_failed_replay_clears_queue() {
        let mut game = synced_client();
        game.apply_local_action(right());
        game.apply_local_action(right());

        // acked the first move but another entity now stands where the second
        // one would go
        game.handle_spawn(2, EntityTraits::player());
        game.apply_broadcast(&broadcast(2, 3.0, 1.0, 0));
        let outcome = game.reconcile_client(&broadcast(1, 2.0, 1.0, 1));

        assert!(matches!(outcome, ReconcileOutcome::Snapped { .. }));
        assert!(game.pending.is_empty());
        assert_eq!(predicted_tile(&game), TilePos::new(2, 1));
        assert_eq!(game.sync_state, SyncState::Synced);
    }

    #[test]
    fn test_older_broadcast_is_ignored() {
        let mut game = synced_client();
        game.reconcile_client(&broadcast(1, 3.0, 1.0, 2));

        let outcome = game.reconcile_client(&broadcast(1, 2.0, 1.0, 1));
        assert_eq!(outcome, ReconcileOutcome::Ignored);
        assert_eq!(predicted_tile(&game), TilePos::new(3, 1));
    }

    #[test]
    fn test_reset_queue_drops_prediction() {
        let mut game = synced_client();
        game.apply_local_action(right());
        game.apply_local_action(right());

        let mut teleport = broadcast(1, 5.0, 3.0, 0);
        teleport.reset_queue = true;
        teleport.no_lerp = true;
        assert_eq!(game.reconcile_client(&teleport), ReconcileOutcome::Reset);
        assert!(game.pending.is_empty());
        assert_eq!(predicted_tile(&game), TilePos::new(5, 3));
        assert!(!game.authoritative_local().unwrap().reset_queue);
    }

    #[test]
    fn test_stale_queue_is_dropped() {
        let mut game = ClientGameState::new(3);
        game.handle_layout(&[], TileMap::parse(ROOM).unwrap());
        game.handle_spawn(1, EntityTraits::player());
        game.set_local(1);
        let mut first = broadcast(1, 1.0, 1.0, 0);
        first.reset_queue = true;
        game.reconcile_client(&first);

        game.apply_local_action(right());
        for _ in 0..3 {
            assert!(!game.update());
        }
        assert!(game.update());
        assert!(game.pending.is_empty());
        assert_eq!(predicted_tile(&game), TilePos::new(1, 1));
        assert_eq!(game.stats.stale_drops, 1);
    }

    #[test]
    fn test_pulled_input_breaks_free() {
        let mut game = synced_client();
        game.handle_pull_update(7, Some(1));
        assert!(game.is_being_pulled());

        assert!(matches!(game.apply_local_action(right()), Some(Packet::StopPull)));
        assert!(!game.is_being_pulled());
        assert!(game.pending.is_empty());
    }

    #[test]
    fn test_follow_update_moves_local_without_sequence() {
        let mut game = synced_client();
        let mut follow = broadcast(1, 2.0, 1.0, 0);
        follow.is_follow_update = true;

        assert_eq!(
            game.reconcile_client(&follow),
            ReconcileOutcome::Snapped {
                predicted: TilePos::new(1, 1),
                authoritative: TilePos::new(2, 1),
            }
        );
        assert_eq!(game.predicted.unwrap().move_number, 0);
        assert!(!game.predicted.unwrap().is_follow_update);
    }

    #[test]
    fn test_remote_entities_are_not_predicted() {
        let mut game = synced_client();
        game.handle_spawn(2, EntityTraits::player());
        game.apply_broadcast(&broadcast(2, 3.0, 2.0, 4));
        game.apply_broadcast(&broadcast(2, 2.0, 2.0, 3));

        let remote = &game.entities[&2];
        assert_eq!(remote.state.tile(), TilePos::new(3, 2));

        game.handle_despawn(2);
        assert!(!game.entities.contains_key(&2));
    }

    #[test]
    fn test_closed_door_bump_is_sent_but_not_predicted() {
        let mut game = synced_client();
        game.handle_tile_changed(FrameId::WORLD, TilePos::new(2, 1), Tile::Door { open: false });

        let packet = game.apply_local_action(right());
        assert!(matches!(packet, Some(Packet::MoveAction(_))));
        assert!(game.pending.is_empty());
        assert_eq!(predicted_tile(&game), TilePos::new(1, 1));
    }

    #[test]
    fn test_diagonal_prediction_slides() {
        let mut game = synced_client();
        game.handle_tile_changed(FrameId::WORLD, TilePos::new(2, 1), Tile::Wall);

        let up_right = MoveFlags::from_direction(Direction::new(1, 1).unwrap());
        game.apply_local_action(up_right);
        assert_eq!(predicted_tile(&game), TilePos::new(1, 2));
    }
}
