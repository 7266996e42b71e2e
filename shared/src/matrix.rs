//! Spatial reference frames ("matrices").
//!
//! Every entity position is stored relative to a frame. The static world frame
//! is the identity transform; other frames are rectangular regions (shuttles,
//! platforms) with their own origin, quarter-turn rotation and velocity.
//!
//! The registry keeps two poses per frame: the authoritative pose advanced by
//! the server and the observed pose last reported to a client. A moving frame's
//! observed pose may lag behind; queries pick one explicitly through [`View`].

use crate::error::SyncError;
use crate::geometry::{TilePos, Vector2};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct FrameId(pub u32);

impl FrameId {
    /// The static world frame. Always present, never moves.
    pub const WORLD: FrameId = FrameId(0);
}

/// Which copy of shared data a query should consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    /// Server ground truth.
    Authoritative,
    /// Whatever the client last received.
    Observed,
}

/// Orientation of a frame relative to world axes, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Rotation {
    #[default]
    Upright,
    Clockwise,
    Flipped,
    CounterClockwise,
}

impl Rotation {
    /// Rotates a frame-local vector into world orientation.
    pub fn apply(self, v: Vector2) -> Vector2 {
        match self {
            Rotation::Upright => v,
            Rotation::Clockwise => Vector2::new(v.y, -v.x),
            Rotation::Flipped => Vector2::new(-v.x, -v.y),
            Rotation::CounterClockwise => Vector2::new(-v.y, v.x),
        }
    }

    pub fn inverse(self) -> Rotation {
        match self {
            Rotation::Clockwise => Rotation::CounterClockwise,
            Rotation::CounterClockwise => Rotation::Clockwise,
            other => other,
        }
    }
}

/// Placement of a frame in world space at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FramePose {
    pub origin: Vector2,
    pub rotation: Rotation,
}

impl FramePose {
    pub const IDENTITY: FramePose = FramePose {
        origin: Vector2::ZERO,
        rotation: Rotation::Upright,
    };

    pub fn local_to_world(&self, local: Vector2) -> Vector2 {
        self.rotation.apply(local) + self.origin
    }

    pub fn world_to_local(&self, world: Vector2) -> Vector2 {
        self.rotation.inverse().apply(world - self.origin)
    }
}

/// Wire description of a frame, sent to clients with the world layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: FrameId,
    pub width: i32,
    pub height: i32,
    pub velocity: Vector2,
    pub pose: FramePose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    /// Local tiles `0..width` x `0..height` belong to this frame.
    pub width: i32,
    pub height: i32,
    /// World units per second, applied to the authoritative pose only.
    pub velocity: Vector2,
    authoritative: FramePose,
    observed: FramePose,
}

impl Frame {
    pub fn new(id: FrameId, width: i32, height: i32, pose: FramePose) -> Self {
        Self {
            id,
            width,
            height,
            velocity: Vector2::ZERO,
            authoritative: pose,
            observed: pose,
        }
    }

    pub fn with_velocity(mut self, velocity: Vector2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn pose(&self, view: View) -> FramePose {
        match view {
            View::Authoritative => self.authoritative,
            View::Observed => self.observed,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vector2::ZERO
    }

    fn contains_local(&self, local: TilePos) -> bool {
        local.x >= 0 && local.y >= 0 && local.x < self.width && local.y < self.height
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            id: self.id,
            width: self.width,
            height: self.height,
            velocity: self.velocity,
            pose: self.authoritative,
        }
    }
}

impl From<FrameInfo> for Frame {
    fn from(info: FrameInfo) -> Self {
        Frame::new(info.id, info.width, info.height, info.pose).with_velocity(info.velocity)
    }
}

/// Registry of every non-world frame. Constructed explicitly and passed by
/// reference; there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct FrameRegistry {
    frames: BTreeMap<FrameId, Frame>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a frame. The world frame id is reserved and ignored.
    pub fn register(&mut self, frame: Frame) {
        if frame.id == FrameId::WORLD {
            warn!("Refusing to register a frame over the world frame");
            return;
        }
        self.frames.insert(frame.id, frame);
    }

    pub fn remove(&mut self, id: FrameId) -> Option<Frame> {
        self.frames.remove(&id)
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Strict lookup for callers that want to know about a missing frame.
    pub fn try_pose(&self, id: FrameId, view: View) -> Result<FramePose, SyncError> {
        if id == FrameId::WORLD {
            return Ok(FramePose::IDENTITY);
        }
        self.frames
            .get(&id)
            .map(|frame| frame.pose(view))
            .ok_or(SyncError::UnknownFrame(id))
    }

    /// Pose of a frame; unknown ids resolve to the world identity.
    pub fn pose(&self, id: FrameId, view: View) -> FramePose {
        match self.try_pose(id, view) {
            Ok(pose) => pose,
            Err(e) => {
                debug!("{}, using world frame", e);
                FramePose::IDENTITY
            }
        }
    }

    pub fn local_to_world(&self, local: Vector2, id: FrameId, view: View) -> Vector2 {
        self.pose(id, view).local_to_world(local)
    }

    pub fn world_to_local(&self, world: Vector2, id: FrameId, view: View) -> Vector2 {
        self.pose(id, view).world_to_local(world)
    }

    /// Frame covering a world point. Overlaps resolve to the lowest id; points
    /// outside every frame belong to the world frame.
    pub fn frame_at(&self, world: Vector2, view: View) -> FrameId {
        self.frames
            .values()
            .find(|frame| {
                let local = frame.pose(view).world_to_local(world).round_to_tile();
                frame.contains_local(local)
            })
            .map(|frame| frame.id)
            .unwrap_or(FrameId::WORLD)
    }

    /// Moves every frame's authoritative pose by its velocity. Returns the ids
    /// that moved.
    pub fn advance(&mut self, dt: f32) -> Vec<FrameId> {
        let mut moved = Vec::new();
        for frame in self.frames.values_mut() {
            if frame.is_moving() {
                frame.authoritative.origin = frame.authoritative.origin + frame.velocity.scale(dt);
                moved.push(frame.id);
            }
        }
        moved
    }

    /// Overrides the authoritative pose, e.g. when a shuttle docks.
    pub fn set_pose(&mut self, id: FrameId, pose: FramePose) -> Result<(), SyncError> {
        let frame = self.frames.get_mut(&id).ok_or(SyncError::UnknownFrame(id))?;
        frame.authoritative = pose;
        Ok(())
    }

    /// Records the pose a client has been told about.
    pub fn observe(&mut self, id: FrameId, pose: FramePose) -> Result<(), SyncError> {
        let frame = self.frames.get_mut(&id).ok_or(SyncError::UnknownFrame(id))?;
        frame.observed = pose;
        Ok(())
    }

    pub fn infos(&self) -> Vec<FrameInfo> {
        self.frames.values().map(Frame::info).collect()
    }

    pub fn from_infos(infos: &[FrameInfo]) -> Self {
        let mut registry = Self::new();
        for info in infos {
            registry.register(Frame::from(*info));
        }
        registry
    }
}
