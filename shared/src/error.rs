//! Error taxonomy for movement synchronisation.
//!
//! Nothing here is fatal to a process. Rejected actions are dropped silently by
//! the server, invalid pulls are reported back to the requester, unknown frames
//! fall back to the world frame and desyncs are repaired by snapping.

use crate::bump::BumpType;
use crate::geometry::TilePos;
use crate::matrix::FrameId;
use crate::state::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the server refused to advance an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RejectReason {
    #[error("expected move #{expected}, got #{received}")]
    BadSequence { expected: u32, received: u32 },

    #[error("entity cannot act (stunned, restrained or unconscious)")]
    CannotAct,

    #[error("sender does not control entity {entity}")]
    NotOwner { entity: EntityId },

    #[error("entity {entity} does not exist")]
    UnknownEntity { entity: EntityId },

    #[error("entity is hidden")]
    Hidden,

    #[error("action carries no movement direction")]
    NoDirection,

    #[error("movement refused with bump {0:?}")]
    Blocked(BumpType),
}

/// Why a pull relationship could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum PullError {
    #[error("entity {pullee} is already pulled by {puller}")]
    AlreadyPulled { pullee: EntityId, puller: EntityId },

    #[error("pulling {pullee} from {puller} would close a cycle")]
    Cycle { puller: EntityId, pullee: EntityId },

    #[error("entity {pullee} is not adjacent to {puller}")]
    NotAdjacent { puller: EntityId, pullee: EntityId },

    #[error("an entity cannot pull itself")]
    SelfPull,

    #[error("entity {entity} does not exist")]
    UnknownEntity { entity: EntityId },

    #[error("entity {entity} is hidden")]
    Hidden { entity: EntityId },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("action rejected: {0}")]
    RejectedAction(#[from] RejectReason),

    #[error("invalid pull: {0}")]
    InvalidPull(#[from] PullError),

    #[error("unknown frame {0:?}")]
    UnknownFrame(FrameId),

    #[error("entity {entity} predicted at {predicted} but server has {authoritative}")]
    DesyncDetected {
        entity: EntityId,
        predicted: TilePos,
        authoritative: TilePos,
    },

    #[error("map parse error at line {line}, column {column}: unexpected {found:?}")]
    MapParse {
        line: usize,
        column: usize,
        found: char,
    },
}
