//! Authoritative world state and the transactions that change it.
//!
//! Movement requests are validated here, resolved with the shared engine over
//! authoritative data and committed to the [`EntityStore`]. Every committed
//! change queues a packet in the outbox and, where something visible happened,
//! a [`GameEvent`]. The network layer drains both once per tick.

use crate::collaborators::{ContainerQuery, StatusEffects, StatusTable};
use crate::events::GameEvent;
use crate::store::{EntityStore, ServerEntity};
use log::{debug, info};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use shared::bump::locate;
use shared::movement::displaced;
use shared::{
    resolve, BumpType, Direction, Displacement, EntityId, EntityState, EntityTraits, Frame,
    FrameId, FramePose, FrameRegistry, MoveAction, MoveFlags, Occupant, Packet, PullError,
    PullTracker, RejectReason, Resolution, Rotation, StateBroadcast, StepKind, SwapRequest,
    SyncError, Tile, TileMap, TilePos, Vector2, View, WorldView,
};

const AUTH: View = View::Authoritative;

/// Built-in map used when no map file is given.
pub const DEMO_MAP: &str = "\
############
#..........#
#..#D#.....#
#..#.#..d..#
#..........#
############";

/// Read access to authoritative data for the resolution engine.
pub struct ServerView<'a> {
    frames: &'a FrameRegistry,
    tiles: RwLockReadGuard<'a, TileMap>,
    store: &'a EntityStore,
    tick: u64,
}

impl WorldView for ServerView<'_> {
    fn frames(&self) -> &FrameRegistry {
        self.frames
    }

    fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    fn occupants_at(&self, world_tile: TilePos, view: View) -> Vec<Occupant> {
        self.store.occupants_at(self.frames, world_tile, view, self.tick)
    }
}

pub struct GameState<C = StatusTable> {
    pub tick: u64,
    frames: FrameRegistry,
    tiles: RwLock<TileMap>,
    store: EntityStore,
    pulls: Mutex<PullTracker>,
    collaborators: C,
    events: Mutex<Vec<GameEvent>>,
    outbox: Mutex<Vec<Packet>>,
    door_requests: Mutex<Vec<(FrameId, TilePos)>>,
}

impl GameState<StatusTable> {
    /// Demo world: a walled room in the world frame plus a small platform.
    pub fn demo() -> Result<Self, SyncError> {
        let mut game = Self::from_map(DEMO_MAP)?;
        let platform = Frame::new(
            FrameId(1),
            3,
            3,
            FramePose {
                origin: Vector2::new(14.0, 1.0),
                rotation: Rotation::Upright,
            },
        );
        game.add_frame(platform, "...\n.#.\n...")?;
        Ok(game)
    }

    pub fn from_map(text: &str) -> Result<Self, SyncError> {
        let tiles = TileMap::parse(text)?;
        Ok(Self::new(FrameRegistry::new(), tiles, StatusTable::new()))
    }
}

impl<C: StatusEffects + ContainerQuery> GameState<C> {
    pub fn new(frames: FrameRegistry, tiles: TileMap, collaborators: C) -> Self {
        Self {
            tick: 0,
            frames,
            tiles: RwLock::new(tiles),
            store: EntityStore::new(),
            pulls: Mutex::new(PullTracker::new()),
            collaborators,
            events: Mutex::new(Vec::new()),
            outbox: Mutex::new(Vec::new()),
            door_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn collaborators(&self) -> &C {
        &self.collaborators
    }

    pub fn collaborators_mut(&mut self) -> &mut C {
        &mut self.collaborators
    }

    pub fn frames(&self) -> &FrameRegistry {
        &self.frames
    }

    pub fn tiles(&self) -> RwLockReadGuard<'_, TileMap> {
        self.tiles.read()
    }

    fn view(&self) -> ServerView<'_> {
        ServerView {
            frames: &self.frames,
            tiles: self.tiles.read(),
            store: &self.store,
            tick: self.tick,
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<ServerEntity> {
        self.store.snapshot(id)
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn pullee_of(&self, puller: EntityId) -> Option<EntityId> {
        self.pulls.lock().pullee_of(puller)
    }

    pub fn puller_of(&self, pullee: EntityId) -> Option<EntityId> {
        self.pulls.lock().puller_of(pullee)
    }

    /// Adds a frame together with its ASCII tile layer.
    pub fn add_frame(&mut self, frame: Frame, layer: &str) -> Result<(), SyncError> {
        let id = frame.id;
        self.frames.register(frame);
        self.tiles.get_mut().parse_layer(id, layer)
    }

    pub fn spawn(&mut self, owner: Option<u32>, traits: EntityTraits, world: Vector2) -> EntityId {
        let id = self.store.allocate_id();
        let mut state = EntityState::at_world(world, &self.frames, AUTH);
        let mut entity = ServerEntity::new(id, owner, traits, state);
        entity.last_visible = Some(world);
        self.store.insert(entity);

        state.reset_queue = true;
        state.no_lerp = true;
        let outbox = self.outbox.get_mut();
        outbox.push(Packet::EntitySpawned { entity: id, traits });
        outbox.push(Packet::StateBroadcast(StateBroadcast::from_state(id, &state)));
        info!("Spawned entity {} at {}", id, world);
        id
    }

    /// Removes an entity for good. Observers drop everything tracked for it.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.break_all_pulls(id);
        if self.store.remove(id).is_none() {
            return false;
        }
        self.events.get_mut().push(GameEvent::Despawned { entity: id });
        self.outbox.get_mut().push(Packet::Despawned { entity: id });
        info!("Despawned entity {}", id);
        true
    }

    /// First floor tile of the world frame that nobody stands on.
    pub fn find_spawn_tile(&self) -> Option<TilePos> {
        let tiles = self.tiles.read();
        let mut floor: Vec<TilePos> = tiles
            .layer(FrameId::WORLD)
            .filter(|(_, tile)| *tile == Tile::Floor)
            .map(|(pos, _)| pos)
            .collect();
        floor.sort();
        floor.into_iter().find(|pos| {
            self.frames.frame_at(pos.to_vector(), AUTH) == FrameId::WORLD
                && self.store.occupants_at(&self.frames, *pos, AUTH, self.tick).is_empty()
        })
    }

    /// Validates and applies one movement request.
    ///
    /// `sender` is the requesting client; `None` skips the ownership check for
    /// server-driven entities. Rejected moves change no entity state and are
    /// not reported to anyone. A pulled entity only breaks free once its own
    /// move has been committed.
    pub fn apply_server_action(
        &self,
        sender: Option<u32>,
        action: &MoveAction,
    ) -> Result<Resolution, SyncError> {
        let entity = self
            .store
            .snapshot(action.entity)
            .ok_or(RejectReason::UnknownEntity {
                entity: action.entity,
            })?;
        if let Some(client) = sender {
            if entity.owner != Some(client) {
                return Err(RejectReason::NotOwner { entity: entity.id }.into());
            }
        }
        if !self.collaborators.can_act(entity.id) {
            return Err(RejectReason::CannotAct.into());
        }
        let origin = entity
            .state
            .world_tile(&self.frames, AUTH)
            .ok_or(RejectReason::Hidden)?;
        let expected = entity.state.move_number.wrapping_add(1);
        if action.sequence != expected {
            return Err(RejectReason::BadSequence {
                expected,
                received: action.sequence,
            }
            .into());
        }

        let resolution = {
            let view = self.view();
            let resolution = resolve(
                &view,
                &entity.state,
                &action.flags,
                entity.id,
                &entity.traits,
                AUTH,
                StepKind::Input,
            )?;

            if !resolution.moved {
                if resolution.bump == BumpType::ClosedDoor {
                    if let Some(direction) = resolution.direction {
                        self.record_door_bump(entity.id, origin.offset(direction));
                    }
                }
                return Err(RejectReason::Blocked(resolution.bump).into());
            }

            match resolution.displacement {
                None => self.commit(&entity, resolution.state)?,
                Some(Displacement::Swap(swap)) => {
                    self.commit_swap(&view, &entity, resolution.state, swap)?
                }
                Some(Displacement::Push { occupant, to }) => {
                    self.commit_push(&view, &entity, resolution.state, occupant, to)?
                }
            }
            resolution
        };

        // Moving on your own breaks free of whoever is pulling you
        self.break_free(entity.id);

        self.follow(entity.id, origin);
        Ok(resolution)
    }

    /// Creates a pull edge. Failures change nothing.
    pub fn start_pull(&self, puller: EntityId, pullee: EntityId) -> Result<(), SyncError> {
        let puller_tile = self
            .store
            .snapshot(puller)
            .ok_or(PullError::UnknownEntity { entity: puller })?
            .state
            .world_tile(&self.frames, AUTH);
        let pullee_tile = self
            .store
            .snapshot(pullee)
            .ok_or(PullError::UnknownEntity { entity: pullee })?
            .state
            .world_tile(&self.frames, AUTH);

        let (already, replaced) = {
            let mut pulls = self.pulls.lock();
            let already = pulls.pullee_of(puller) == Some(pullee);
            let replaced = pulls.start_pull(puller, pullee, puller_tile, pullee_tile)?;
            (already, replaced)
        };
        if already {
            return Ok(());
        }

        if let Some(old) = replaced {
            self.events.lock().push(GameEvent::PullBroken { puller, pullee: old });
        }
        info!("Entity {} is now pulling {}", puller, pullee);
        self.events.lock().push(GameEvent::PullStarted { puller, pullee });
        self.outbox.lock().push(Packet::PullUpdate {
            puller,
            pullee: Some(pullee),
        });
        Ok(())
    }

    /// Releases the puller's pullee, if any.
    pub fn stop_pull(&self, puller: EntityId) -> Option<EntityId> {
        let released = self.pulls.lock().stop_pull(puller);
        if let Some(pullee) = released {
            info!("Pull {} -> {} broken", puller, pullee);
            self.events.lock().push(GameEvent::PullBroken { puller, pullee });
            self.outbox
                .lock()
                .push(Packet::PullUpdate { puller, pullee: None });
        }
        released
    }

    /// Breaks the pull holding `pullee`. Returns the former puller.
    pub fn break_free(&self, pullee: EntityId) -> Option<EntityId> {
        let puller = self.puller_of(pullee)?;
        self.stop_pull(puller);
        Some(puller)
    }

    pub fn set_intent(&self, id: EntityId, help: bool) -> Result<(), SyncError> {
        let mut entity = self
            .store
            .lock(id)
            .ok_or(RejectReason::UnknownEntity { entity: id })?;
        entity.traits.help_intent = help;
        Ok(())
    }

    /// Moves an entity instantly. Pulls break and clients drop prediction.
    pub fn teleport(&self, id: EntityId, world: Vector2) -> Result<(), SyncError> {
        self.place(id, world)
    }

    /// Takes an entity out of a container and puts it back into the world.
    pub fn appear_at(&self, id: EntityId, world: Vector2) -> Result<(), SyncError> {
        self.place(id, world)
    }

    /// Stores `id` inside `container`. Only hiding containers take the entity
    /// out of the world; returns whether that happened.
    pub fn hide_in(&self, id: EntityId, container: EntityId) -> Result<bool, SyncError> {
        if !self.store.contains(container) {
            return Err(RejectReason::UnknownEntity { entity: container }.into());
        }
        if !self.collaborators.is_hidden_container(container) {
            return Ok(false);
        }
        self.break_all_pulls(id);

        let mut entity = self
            .store
            .lock(id)
            .ok_or(RejectReason::UnknownEntity { entity: id })?;
        let mut next = entity.state.without_flags().hidden();
        next.reset_queue = true;
        entity.container = Some(container);
        if let Some(last) = entity.state.world_position(&self.frames, AUTH) {
            entity.last_visible = Some(last);
        }
        self.store_state(&mut entity, next);
        debug!("Entity {} hidden inside {}", id, container);
        Ok(true)
    }

    /// Where an entity is, or would be if it were visible: its own position,
    /// its container's, or the last place it was seen.
    pub fn assumed_world_position(&self, id: EntityId) -> Option<Vector2> {
        let mut current = id;
        for _ in 0..=self.store.len() {
            let entity = self.store.snapshot(current)?;
            if let Some(position) = entity.state.world_position(&self.frames, AUTH) {
                return Some(position);
            }
            match entity.container {
                Some(container) if self.store.contains(container) => current = container,
                _ => return entity.last_visible,
            }
        }
        None
    }

    pub fn authoritative_world_position(&self, id: EntityId) -> Option<Vector2> {
        self.store
            .snapshot(id)?
            .state
            .world_position(&self.frames, AUTH)
    }

    pub fn set_tile(&self, frame: FrameId, tile: TilePos, kind: Tile) {
        self.tiles.write().set(frame, tile, kind);
        self.outbox
            .lock()
            .push(Packet::TileChanged { frame, tile, kind });
    }

    /// Opens or closes a door. Returns false when the tile is not a door.
    pub fn set_door(&self, frame: FrameId, tile: TilePos, open: bool) -> bool {
        let kind = {
            let mut tiles = self.tiles.write();
            if !tiles.set_door(frame, tile, open) {
                return false;
            }
            tiles.get(frame, tile)
        };
        self.outbox
            .lock()
            .push(Packet::TileChanged { frame, tile, kind });
        true
    }

    /// Moves frames by their velocity and announces their new poses.
    pub fn advance_frames(&mut self, dt: f32) {
        for id in self.frames.advance(dt) {
            if let Ok(pose) = self.frames.try_pose(id, AUTH) {
                self.outbox
                    .get_mut()
                    .push(Packet::FrameUpdate { frame: id, pose });
            }
        }
    }

    /// Finishes the tick: doors bumped during it open. Returns the new tick.
    pub fn end_tick(&mut self) -> u64 {
        let requests = std::mem::take(self.door_requests.get_mut());
        for (frame, tile) in requests {
            if self.set_door(frame, tile, true) {
                debug!("Opened door at {} in frame {}", tile, frame.0);
            }
        }
        self.tick += 1;
        self.tick
    }

    pub fn drain_events(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn drain_outbox(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.outbox.lock())
    }

    /// Current state of every entity, for periodic rebroadcast.
    pub fn snapshot_packets(&self) -> Vec<Packet> {
        self.store
            .ids()
            .into_iter()
            .filter_map(|id| {
                let entity = self.store.snapshot(id)?;
                Some(Packet::StateBroadcast(StateBroadcast::from_state(
                    id,
                    &entity.state,
                )))
            })
            .collect()
    }

    pub fn layout_packet(&self) -> Packet {
        Packet::WorldLayout {
            frames: self.frames.infos(),
            tiles: self.tiles.read().clone(),
        }
    }

    /// Everything a freshly connected client needs to know.
    pub fn sync_packets(&self) -> Vec<Packet> {
        let mut packets = vec![self.layout_packet()];
        for id in self.store.ids() {
            if let Some(entity) = self.store.snapshot(id) {
                packets.push(Packet::EntitySpawned {
                    entity: id,
                    traits: entity.traits,
                });
                let mut state = entity.state;
                state.reset_queue = true;
                state.no_lerp = true;
                packets.push(Packet::StateBroadcast(StateBroadcast::from_state(id, &state)));
            }
        }
        for (puller, pullee) in self.pulls.lock().edges() {
            packets.push(Packet::PullUpdate {
                puller,
                pullee: Some(pullee),
            });
        }
        packets
    }

    fn place(&self, id: EntityId, world: Vector2) -> Result<(), SyncError> {
        if !self.store.contains(id) {
            return Err(RejectReason::UnknownEntity { entity: id }.into());
        }
        self.break_all_pulls(id);

        let mut entity = self
            .store
            .lock(id)
            .ok_or(RejectReason::UnknownEntity { entity: id })?;
        let mut next = entity.state.without_flags().relocated(world, &self.frames, AUTH);
        next.no_lerp = true;
        next.reset_queue = true;
        entity.container = None;
        self.store_state(&mut entity, next);
        Ok(())
    }

    fn break_all_pulls(&self, id: EntityId) {
        let broken = self.pulls.lock().break_all(id);
        for (puller, pullee) in broken {
            info!("Pull {} -> {} broken", puller, pullee);
            self.events.lock().push(GameEvent::PullBroken { puller, pullee });
            self.outbox
                .lock()
                .push(Packet::PullUpdate { puller, pullee: None });
        }
    }

    fn record_door_bump(&self, entity: EntityId, world_tile: TilePos) {
        let (frame, tile) = locate(&self.frames, world_tile, AUTH);
        self.events
            .lock()
            .push(GameEvent::DoorBumped { entity, frame, tile });
        self.door_requests.lock().push((frame, tile));
    }

    /// Writes a new state and queues its broadcast. One-shot flags go out with
    /// the broadcast but are not kept in the store.
    fn store_state(&self, entity: &mut ServerEntity, next: EntityState) {
        let from = entity.state.world_position(&self.frames, AUTH);
        let to = next.world_position(&self.frames, AUTH);
        entity.state = next.without_flags();
        if to.is_some() {
            entity.last_visible = to;
            entity.last_moved_tick = Some(self.tick);
        }
        self.outbox
            .lock()
            .push(Packet::StateBroadcast(StateBroadcast::from_state(entity.id, &next)));
        if let (Some(from), Some(to)) = (from, to) {
            if from != to {
                self.events.lock().push(GameEvent::EntityMoved {
                    entity: entity.id,
                    from,
                    to,
                });
            }
        }
    }

    fn conflict(current: &EntityState, next: &EntityState) -> SyncError {
        RejectReason::BadSequence {
            expected: current.move_number.wrapping_add(1),
            received: next.move_number,
        }
        .into()
    }

    fn commit(&self, before: &ServerEntity, next: EntityState) -> Result<(), SyncError> {
        let mut entity = self
            .store
            .lock(before.id)
            .ok_or(RejectReason::UnknownEntity { entity: before.id })?;
        if entity.state != before.state {
            return Err(Self::conflict(&entity.state, &next));
        }
        self.store_state(&mut entity, next);
        Ok(())
    }

    fn commit_swap(
        &self,
        view: &ServerView<'_>,
        before: &ServerEntity,
        next: EntityState,
        swap: SwapRequest,
    ) -> Result<(), SyncError> {
        {
            let (mut mover, mut swapee) = self
                .store
                .lock_pair(swap.mover, swap.swapee)
                .ok_or(RejectReason::UnknownEntity {
                    entity: swap.swapee,
                })?;
            if mover.state != before.state {
                return Err(Self::conflict(&mover.state, &next));
            }
            let still_there = swapee.state.world_tile(&self.frames, AUTH)
                == next.world_tile(&self.frames, AUTH);
            if !still_there || swapee.moved_during(self.tick) {
                return Err(RejectReason::Blocked(BumpType::Blocked).into());
            }

            let swapee_next = displaced(view, &swapee.state, swap.target, AUTH);
            self.store_state(&mut mover, next);
            self.store_state(&mut swapee, swapee_next);
        }

        self.events.lock().push(GameEvent::Swapped {
            mover: swap.mover,
            swapee: swap.swapee,
        });
        if let Some(puller) = self.puller_of(swap.swapee) {
            if puller != swap.mover {
                self.stop_pull(puller);
            }
        }
        Ok(())
    }

    fn commit_push(
        &self,
        view: &ServerView<'_>,
        before: &ServerEntity,
        next: EntityState,
        occupant: EntityId,
        to: TilePos,
    ) -> Result<(), SyncError> {
        {
            let (mut mover, mut pushed) = self
                .store
                .lock_pair(before.id, occupant)
                .ok_or(RejectReason::UnknownEntity { entity: occupant })?;
            if mover.state != before.state {
                return Err(Self::conflict(&mover.state, &next));
            }
            if pushed.state.world_tile(&self.frames, AUTH) != next.world_tile(&self.frames, AUTH) {
                return Err(RejectReason::Blocked(BumpType::Push).into());
            }

            let pushed_next = displaced(view, &pushed.state, to, AUTH);
            self.store_state(&mut mover, next);
            self.store_state(&mut pushed, pushed_next);
        }

        self.events.lock().push(GameEvent::Pushed {
            mover: before.id,
            occupant,
        });
        Ok(())
    }

    /// Drags the pull chain behind `puller`, which just left `vacated`. Each
    /// pullee must land exactly on the tile its puller left or the pull breaks.
    fn follow(&self, puller: EntityId, vacated: TilePos) {
        let mut puller = puller;
        let mut target = vacated;

        for _ in 0..self.store.len() {
            let Some(pullee) = self.pullee_of(puller) else {
                return;
            };
            let Some(entity) = self.store.snapshot(pullee) else {
                self.stop_pull(puller);
                return;
            };
            let Some(current) = entity.state.world_tile(&self.frames, AUTH) else {
                self.stop_pull(puller);
                return;
            };
            if current == target {
                return;
            }

            let next = Direction::between(current, target).and_then(|direction| {
                let view = self.view();
                let step = resolve(
                    &view,
                    &entity.state,
                    &MoveFlags::from_direction(direction),
                    pullee,
                    &entity.traits,
                    AUTH,
                    StepKind::Follow,
                )
                .ok()?;
                let lands = step.state.world_tile(&self.frames, AUTH) == Some(target);
                (step.moved && step.displacement.is_none() && lands).then_some(step.state)
            });

            match next {
                Some(next) if self.commit(&entity, next).is_ok() => {
                    puller = pullee;
                    target = current;
                }
                _ => {
                    debug!("Entity {} could not follow {}", pullee, puller);
                    self.stop_pull(puller);
                    return;
                }
            }
        }
    }
}
