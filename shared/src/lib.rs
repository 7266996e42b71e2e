//! Types and rules shared by the tile sync server and client.
//!
//! Both sides run the same movement resolution over their own view of the
//! world: the server over authoritative data, the client over what it has
//! observed. The wire protocol lives here as [`Packet`].

pub mod action;
pub mod bump;
pub mod error;
pub mod geometry;
pub mod matrix;
pub mod movement;
pub mod pull;
pub mod state;
pub mod tilemap;

pub use action::{MoveAction, MoveFlags, MoveKey};
pub use bump::{classify_bump, BumpType, Capability, EntityTraits, Occupant, SizeClass, WorldView};
pub use error::{PullError, RejectReason, SyncError};
pub use geometry::{Direction, TilePos, Vector2};
pub use matrix::{Frame, FrameId, FrameInfo, FramePose, FrameRegistry, Rotation, View};
pub use movement::{resolve, Displacement, Resolution, StepKind, SwapRequest};
pub use pull::PullTracker;
pub use state::{EntityId, EntityState, HIDDEN_POS};
pub use tilemap::{Tile, TileMap};

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
/// Tiles per second for a freshly spawned walker.
pub const DEFAULT_WALK_SPEED: f32 = 6.0;
pub const MAX_PACKET_SIZE: usize = 65536;

/// Authoritative state of one entity as sent to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateBroadcast {
    pub entity: EntityId,
    pub sequence: u32,
    pub frame: FrameId,
    pub local_x: f32,
    pub local_y: f32,
    pub speed: f32,
    pub impulse_x: f32,
    pub impulse_y: f32,
    pub no_lerp: bool,
    pub reset_queue: bool,
    pub is_follow_update: bool,
}

impl StateBroadcast {
    pub fn from_state(entity: EntityId, state: &EntityState) -> Self {
        Self {
            entity,
            sequence: state.move_number,
            frame: state.frame,
            local_x: state.position.x,
            local_y: state.position.y,
            speed: state.speed(),
            impulse_x: state.impulse.x,
            impulse_y: state.impulse.y,
            no_lerp: state.no_lerp,
            reset_queue: state.reset_queue,
            is_follow_update: state.is_follow_update,
        }
    }

    pub fn to_state(&self) -> EntityState {
        let mut state = EntityState::HIDDEN;
        state.move_number = self.sequence;
        state.position = Vector2::new(self.local_x, self.local_y);
        state.frame = self.frame;
        state.set_speed(self.speed);
        state.impulse = Vector2::new(self.impulse_x, self.impulse_y);
        state.no_lerp = self.no_lerp;
        state.reset_queue = self.reset_queue;
        state.is_follow_update = self.is_follow_update;
        state
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        help_intent: bool,
    },
    MoveAction(MoveAction),
    StartPull {
        target: EntityId,
    },
    /// Releases whatever the sender pulls, or breaks free when pulled.
    StopPull,
    SetIntent {
        help: bool,
    },
    Disconnect,
    /// Keeps an idle connection from timing out.
    Heartbeat,

    Connected {
        client_id: u32,
        entity: EntityId,
    },
    WorldLayout {
        frames: Vec<FrameInfo>,
        tiles: TileMap,
    },
    TileChanged {
        frame: FrameId,
        tile: TilePos,
        kind: Tile,
    },
    FrameUpdate {
        frame: FrameId,
        pose: FramePose,
    },
    StateBroadcast(StateBroadcast),
    EntitySpawned {
        entity: EntityId,
        traits: EntityTraits,
    },
    PullUpdate {
        puller: EntityId,
        pullee: Option<EntityId>,
    },
    PullRejected {
        reason: PullError,
    },
    Despawned {
        entity: EntityId,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
