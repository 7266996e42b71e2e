//! Authoritative entity storage.
//!
//! Each entity sits behind its own lock so actions for different entities can
//! be resolved side by side. Transactions that touch two entities (swaps,
//! pushes) take both locks through [`EntityStore::lock_pair`], which always
//! locks the lower id first.
//!
//! Never hold an entity guard while running movement resolution: occupancy
//! queries lock every entity in turn.

use parking_lot::{Mutex, MutexGuard};
use shared::{EntityId, EntityState, EntityTraits, FrameRegistry, Occupant, TilePos, Vector2, View};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ServerEntity {
    pub id: EntityId,
    /// Controlling client, if any.
    pub owner: Option<u32>,
    pub traits: EntityTraits,
    pub state: EntityState,
    /// Tick of the last position change. Entities that moved this tick are not
    /// swap candidates.
    pub last_moved_tick: Option<u64>,
    /// Entity this one is stored inside while hidden.
    pub container: Option<EntityId>,
    /// Last world position before being hidden.
    pub last_visible: Option<Vector2>,
}

impl ServerEntity {
    pub fn new(id: EntityId, owner: Option<u32>, traits: EntityTraits, state: EntityState) -> Self {
        Self {
            id,
            owner,
            traits,
            state,
            last_moved_tick: None,
            container: None,
            last_visible: None,
        }
    }

    pub fn moved_during(&self, tick: u64) -> bool {
        self.last_moved_tick == Some(tick)
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Mutex<ServerEntity>>,
    next_id: EntityId,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn insert(&mut self, entity: ServerEntity) {
        self.next_id = self.next_id.max(entity.id + 1);
        self.entities.insert(entity.id, Mutex::new(entity));
    }

    pub fn remove(&mut self, id: EntityId) -> Option<ServerEntity> {
        self.entities.remove(&id).map(Mutex::into_inner)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn lock(&self, id: EntityId) -> Option<MutexGuard<'_, ServerEntity>> {
        self.entities.get(&id).map(|entity| entity.lock())
    }

    /// Copy of one entity, taken under its lock and released immediately.
    pub fn snapshot(&self, id: EntityId) -> Option<ServerEntity> {
        self.lock(id).map(|guard| guard.clone())
    }

    /// Locks two distinct entities in ascending id order. Guards are returned
    /// in argument order.
    pub fn lock_pair(
        &self,
        a: EntityId,
        b: EntityId,
    ) -> Option<(MutexGuard<'_, ServerEntity>, MutexGuard<'_, ServerEntity>)> {
        if a == b {
            return None;
        }
        let first = self.entities.get(&a.min(b))?;
        let second = self.entities.get(&a.max(b))?;
        let low = first.lock();
        let high = second.lock();
        if a < b {
            Some((low, high))
        } else {
            Some((high, low))
        }
    }

    /// Active entities standing on `world_tile`, with whether they moved during
    /// `tick`.
    pub fn occupants_at(
        &self,
        frames: &FrameRegistry,
        world_tile: TilePos,
        view: View,
        tick: u64,
    ) -> Vec<Occupant> {
        self.entities
            .values()
            .filter_map(|entity| {
                let entity = entity.lock();
                let tile = entity.state.world_tile(frames, view)?;
                (tile == world_tile).then(|| Occupant {
                    id: entity.id,
                    traits: entity.traits,
                    moving: entity.moved_during(tick),
                })
            })
            .collect()
    }
}
