use crate::geometry::{TilePos, Vector2};
use crate::matrix::{FrameId, FrameRegistry, View};
use crate::DEFAULT_WALK_SPEED;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type EntityId = u32;

/// Frame-local position marking an entity that is out of the world, e.g.
/// stored in a locker. Never transformed and never occupies a tile.
pub const HIDDEN_POS: Vector2 = Vector2 {
    x: -1_000_000.0,
    y: -1_000_000.0,
};

/// Snapshot of one entity's movement state.
///
/// Values are replaced, never edited in place, by the resolution engine: each
/// accepted move produces a new state with `move_number` one higher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Accepted moves so far. Strictly increasing by one per accepted action.
    pub move_number: u32,
    /// Position local to `frame`. Logically snapped to the tile grid.
    pub position: Vector2,
    pub frame: FrameId,
    speed: f32,
    /// Direction of flight for thrown or drifting entities.
    pub impulse: Vector2,
    /// Produced by being towed; the puller's own prediction ignores it.
    pub is_follow_update: bool,
    /// Teleport: skip visual interpolation.
    pub no_lerp: bool,
    /// Clients must drop pending prediction and jump to this state.
    pub reset_queue: bool,
}

impl EntityState {
    pub const HIDDEN: EntityState = EntityState {
        move_number: 0,
        position: HIDDEN_POS,
        frame: FrameId::WORLD,
        speed: 0.0,
        impulse: Vector2::ZERO,
        is_follow_update: false,
        no_lerp: false,
        reset_queue: false,
    };

    /// New state at a world position, parented to whichever frame covers it.
    pub fn at_world(world: Vector2, frames: &FrameRegistry, view: View) -> Self {
        EntityState {
            position: world,
            speed: DEFAULT_WALK_SPEED,
            ..EntityState::HIDDEN
        }
        .relocated(world, frames, view)
    }

    pub fn is_active(&self) -> bool {
        self.position != HIDDEN_POS
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Speeds are never negative.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.set_speed(speed);
        self
    }

    /// Frame-local tile.
    pub fn tile(&self) -> TilePos {
        self.position.round_to_tile()
    }

    pub fn world_position(&self, frames: &FrameRegistry, view: View) -> Option<Vector2> {
        if !self.is_active() {
            return None;
        }
        Some(frames.local_to_world(self.position, self.frame, view))
    }

    pub fn world_tile(&self, frames: &FrameRegistry, view: View) -> Option<TilePos> {
        self.world_position(frames, view).map(|p| p.round_to_tile())
    }

    /// Same state moved to `world`, re-parented to the frame covering it. The
    /// world position is kept exactly; the local one is re-derived.
    pub fn relocated(&self, world: Vector2, frames: &FrameRegistry, view: View) -> EntityState {
        let frame = frames.frame_at(world, view);
        EntityState {
            frame,
            position: frames.world_to_local(world, frame, view),
            ..*self
        }
    }

    /// Same state taken out of the world. Move number and speed survive.
    pub fn hidden(&self) -> EntityState {
        EntityState {
            position: HIDDEN_POS,
            frame: FrameId::WORLD,
            impulse: Vector2::ZERO,
            ..*self
        }
    }

    /// Copy with the one-shot delivery flags cleared.
    pub fn without_flags(&self) -> EntityState {
        EntityState {
            is_follow_update: false,
            no_lerp: false,
            reset_queue: false,
            ..*self
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_active() {
            return write!(f, "[Hidden]");
        }
        write!(
            f,
            "[Move #{}, local {}, frame #{}, speed {:.1}, impulse {}, noLerp {}, reset {}, follow {}]",
            self.move_number,
            self.position,
            self.frame.0,
            self.speed,
            self.impulse,
            self.no_lerp,
            self.reset_queue,
            self.is_follow_update
        )
    }
}
