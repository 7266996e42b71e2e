//! Directed pull edges between entities.
//!
//! Each entity pulls at most one other and is pulled by at most one puller.
//! Edges never form a cycle. Positions are supplied by the caller so the
//! tracker stays a plain data structure with no access to entity state.

use crate::error::PullError;
use crate::geometry::TilePos;
use crate::state::EntityId;
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct PullTracker {
    /// puller -> pullee
    pulling: BTreeMap<EntityId, EntityId>,
    /// pullee -> puller
    pulled_by: BTreeMap<EntityId, EntityId>,
}

impl PullTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the edge `puller -> pullee`. A tile of `None` means the entity
    /// is hidden. Returns the pullee the puller let go of to start this pull,
    /// if any. Re-pulling the current pullee is a no-op.
    pub fn start_pull(
        &mut self,
        puller: EntityId,
        pullee: EntityId,
        puller_tile: Option<TilePos>,
        pullee_tile: Option<TilePos>,
    ) -> Result<Option<EntityId>, PullError> {
        if puller == pullee {
            return Err(PullError::SelfPull);
        }
        let puller_tile = puller_tile.ok_or(PullError::Hidden { entity: puller })?;
        let pullee_tile = pullee_tile.ok_or(PullError::Hidden { entity: pullee })?;

        if let Some(&current) = self.pulled_by.get(&pullee) {
            if current == puller {
                return Ok(None);
            }
            return Err(PullError::AlreadyPulled {
                pullee,
                puller: current,
            });
        }

        if self.chain_contains(puller, pullee) {
            return Err(PullError::Cycle { puller, pullee });
        }

        if !puller_tile.is_adjacent(&pullee_tile) {
            return Err(PullError::NotAdjacent { puller, pullee });
        }

        let replaced = self.stop_pull(puller);
        self.pulling.insert(puller, pullee);
        self.pulled_by.insert(pullee, puller);
        debug!("Entity {} started pulling {}", puller, pullee);
        Ok(replaced)
    }

    /// Removes the puller's outgoing edge. Returns the released pullee.
    pub fn stop_pull(&mut self, puller: EntityId) -> Option<EntityId> {
        let pullee = self.pulling.remove(&puller)?;
        self.pulled_by.remove(&pullee);
        debug!("Entity {} stopped pulling {}", puller, pullee);
        Some(pullee)
    }

    pub fn pullee_of(&self, puller: EntityId) -> Option<EntityId> {
        self.pulling.get(&puller).copied()
    }

    pub fn puller_of(&self, pullee: EntityId) -> Option<EntityId> {
        self.pulled_by.get(&pullee).copied()
    }

    /// Drops both edges touching `id`, e.g. on despawn or hide. Returns the
    /// removed edges as `(puller, pullee)` pairs.
    pub fn break_all(&mut self, id: EntityId) -> Vec<(EntityId, EntityId)> {
        let mut broken = Vec::new();
        if let Some(pullee) = self.stop_pull(id) {
            broken.push((id, pullee));
        }
        if let Some(puller) = self.puller_of(id) {
            self.stop_pull(puller);
            broken.push((puller, id));
        }
        broken
    }

    pub fn edges(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.pulling.iter().map(|(puller, pullee)| (*puller, *pullee))
    }

    pub fn len(&self) -> usize {
        self.pulling.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulling.is_empty()
    }

    /// True when `target` is `start` or pulls it, directly or through a chain.
    fn chain_contains(&self, start: EntityId, target: EntityId) -> bool {
        let mut current = start;
        loop {
            if current == target {
                return true;
            }
            match self.pulled_by.get(&current) {
                Some(&next) if next != start => current = next,
                _ => return false,
            }
        }
    }
}
