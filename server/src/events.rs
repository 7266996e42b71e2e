use shared::{EntityId, FrameId, TilePos, Vector2};

/// Notification for presentation and audio layers. Collected during a tick and
/// drained once at its end.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EntityMoved {
        entity: EntityId,
        from: Vector2,
        to: Vector2,
    },
    PullStarted {
        puller: EntityId,
        pullee: EntityId,
    },
    PullBroken {
        puller: EntityId,
        pullee: EntityId,
    },
    Swapped {
        mover: EntityId,
        swapee: EntityId,
    },
    Pushed {
        mover: EntityId,
        occupant: EntityId,
    },
    DoorBumped {
        entity: EntityId,
        frame: FrameId,
        tile: TilePos,
    },
    Despawned {
        entity: EntityId,
    },
}
