//! Interfaces to systems outside movement sync.
//!
//! Status effects and inventory containers are owned elsewhere in a full game.
//! The server only asks two questions of them, so they are traits here with a
//! simple table implementation used by the binary and tests.

use shared::EntityId;
use std::collections::HashSet;

pub trait StatusEffects {
    /// False while stunned, restrained or unconscious.
    fn can_act(&self, entity: EntityId) -> bool;
}

pub trait ContainerQuery {
    /// True when storing something in `entity` removes it from the world.
    fn is_hidden_container(&self, entity: EntityId) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct StatusTable {
    incapacitated: HashSet<EntityId>,
    containers: HashSet<EntityId>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_incapacitated(&mut self, entity: EntityId, incapacitated: bool) {
        if incapacitated {
            self.incapacitated.insert(entity);
        } else {
            self.incapacitated.remove(&entity);
        }
    }

    pub fn mark_container(&mut self, entity: EntityId) {
        self.containers.insert(entity);
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.incapacitated.remove(&entity);
        self.containers.remove(&entity);
    }
}

impl StatusEffects for StatusTable {
    fn can_act(&self, entity: EntityId) -> bool {
        !self.incapacitated.contains(&entity)
    }
}

impl ContainerQuery for StatusTable {
    fn is_hidden_container(&self, entity: EntityId) -> bool {
        self.containers.contains(&entity)
    }
}
