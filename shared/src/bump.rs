//! Tile occupancy query: what happens when an entity steps into a tile.

use crate::geometry::{Direction, TilePos};
use crate::matrix::{FrameId, FrameRegistry, View};
use crate::state::EntityId;
use crate::tilemap::TileMap;
use serde::{Deserialize, Serialize};

/// Outcome of trying to move into a tile. Exactly one applies per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BumpType {
    /// Free to enter.
    None,
    /// Impassable, nothing to interact with.
    Blocked,
    /// Occupied by something the mover can shove.
    Push,
    /// A closed door that can be interacted with to open.
    ClosedDoor,
    /// Occupied by someone the mover can trade places with.
    HelpIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum SizeClass {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Capability {
    /// Collides with walls, doors and other entities.
    #[default]
    Walking,
    /// Observers and ghosts pass through everything.
    Incorporeal,
}

/// Static properties that decide how an entity collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTraits {
    pub size: SizeClass,
    /// Bolted down; never pushed.
    pub anchored: bool,
    /// Non-hostile intent, allowing position swaps.
    pub help_intent: bool,
    pub capability: Capability,
}

impl EntityTraits {
    pub fn player() -> Self {
        Self {
            size: SizeClass::Huge,
            anchored: false,
            help_intent: false,
            capability: Capability::Walking,
        }
    }

    pub fn ghost() -> Self {
        Self {
            capability: Capability::Incorporeal,
            ..Self::player()
        }
    }

    pub fn object(size: SizeClass) -> Self {
        Self {
            size,
            anchored: false,
            help_intent: false,
            capability: Capability::Walking,
        }
    }

    pub fn with_help_intent(mut self, help_intent: bool) -> Self {
        self.help_intent = help_intent;
        self
    }

    pub fn anchored(mut self) -> Self {
        self.anchored = true;
        self
    }

    /// Movers can shove anything loose that is not huge and not bigger than
    /// themselves.
    pub fn can_push(&self, other: &EntityTraits) -> bool {
        !other.anchored && other.size < SizeClass::Huge && other.size <= self.size
    }
}

/// An entity standing on a tile, as seen by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub id: EntityId,
    pub traits: EntityTraits,
    /// Moved during the current tick, so not available for a swap.
    pub moving: bool,
}

/// Read access to everything movement resolution needs. Implemented by the
/// server over authoritative data and by the client over observed data.
pub trait WorldView {
    fn frames(&self) -> &FrameRegistry;

    fn tiles(&self) -> &TileMap;

    /// Active entities whose position rounds to `world_tile`.
    fn occupants_at(&self, world_tile: TilePos, view: View) -> Vec<Occupant>;
}

/// Classification plus the occupant that caused it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub bump: BumpType,
    pub destination: TilePos,
    pub occupant: Option<Occupant>,
}

/// Resolves a world tile to the frame covering it and its local coordinates.
pub fn locate(frames: &FrameRegistry, world_tile: TilePos, view: View) -> (FrameId, TilePos) {
    let world = world_tile.to_vector();
    let frame = frames.frame_at(world, view);
    let local = frames.world_to_local(world, frame, view).round_to_tile();
    (frame, local)
}

/// Full probe of the tile one step from `from`. First matching rule wins:
/// structural blockage, then occupants, then closed doors.
pub fn probe<W: WorldView + ?Sized>(
    world: &W,
    from: TilePos,
    direction: Direction,
    mover: EntityId,
    traits: &EntityTraits,
    view: View,
) -> Probe {
    let destination = from.offset(direction);
    let (frame, local) = locate(world.frames(), destination, view);
    let tiles = world.tiles();

    let result = |bump, occupant| Probe {
        bump,
        destination,
        occupant,
    };

    if tiles.is_tile_blocking(frame, local) {
        return result(BumpType::Blocked, None);
    }

    let occupants: Vec<Occupant> = world
        .occupants_at(destination, view)
        .into_iter()
        .filter(|o| o.id != mover)
        .collect();

    match occupants.as_slice() {
        [] => {}
        [occupant] => {
            let occupant = *occupant;
            if traits.help_intent && occupant.traits.help_intent && !occupant.moving {
                return result(BumpType::HelpIntent, Some(occupant));
            }
            if traits.can_push(&occupant.traits) {
                return result(BumpType::Push, Some(occupant));
            }
            return result(BumpType::Blocked, Some(occupant));
        }
        [first, ..] => return result(BumpType::Blocked, Some(*first)),
    }

    if tiles.is_closed_door(frame, local) {
        return result(BumpType::ClosedDoor, None);
    }

    result(BumpType::None, None)
}

/// Classifies moving one step from `from` in `direction`.
pub fn classify_bump<W: WorldView + ?Sized>(
    world: &W,
    from: TilePos,
    direction: Direction,
    mover: EntityId,
    traits: &EntityTraits,
    view: View,
) -> BumpType {
    probe(world, from, direction, mover, traits, view).bump
}
