//! Movement resolution engine shared by server authority and client prediction.
//!
//! [`resolve`] is a pure function of the current state, the requested keys and
//! a [`WorldView`]. It never mutates anything; side effects on other entities
//! (pushes and swaps) are returned as a [`Displacement`] for the caller to apply
//! as one transaction.

use crate::action::MoveFlags;
use crate::bump::{locate, probe, BumpType, Capability, EntityTraits, Probe, WorldView};
use crate::error::{RejectReason, SyncError};
use crate::geometry::{Direction, TilePos};
use crate::matrix::View;
use crate::state::{EntityId, EntityState};

/// What produced the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// The entity's own input. Consumes one move number.
    Input,
    /// Towed by a puller. Keeps the move number and sets `is_follow_update`.
    Follow,
}

/// Internal request to move a help-intent occupant into the mover's old tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub mover: EntityId,
    pub swapee: EntityId,
    /// World tile the swapee ends up on.
    pub target: TilePos,
}

/// Change to another entity that must be applied together with the mover's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Displacement {
    Push { occupant: EntityId, to: TilePos },
    Swap(SwapRequest),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Next state. Equal to the input state when nothing moved.
    pub state: EntityState,
    /// Classification of the direction finally taken.
    pub bump: BumpType,
    pub moved: bool,
    /// Direction chosen after any diagonal slide, also when the step was
    /// refused. A refused `ClosedDoor` step points at the door.
    pub direction: Option<Direction>,
    pub displacement: Option<Displacement>,
}

/// Computes the next state for one step.
///
/// Diagonal steps are taken directly only when the diagonal tile and both
/// cardinal neighbours are free. Otherwise the step slides along one axis,
/// preferring free or swappable tiles, then pushable ones, then closed doors,
/// with x before y on ties. Incorporeal movers ignore every obstruction.
pub fn resolve<W: WorldView + ?Sized>(
    world: &W,
    current: &EntityState,
    flags: &MoveFlags,
    mover: EntityId,
    traits: &EntityTraits,
    view: View,
    kind: StepKind,
) -> Result<Resolution, SyncError> {
    let direction = flags.direction().ok_or(RejectReason::NoDirection)?;
    let origin = current
        .world_tile(world.frames(), view)
        .ok_or(RejectReason::Hidden)?;

    if traits.capability == Capability::Incorporeal {
        return Ok(advance(world, current, origin, direction, BumpType::None, None, view, kind));
    }

    let (taken, step) = if direction.is_diagonal() {
        slide(world, origin, direction, mover, traits, view)
    } else {
        (direction, probe(world, origin, direction, mover, traits, view))
    };

    let resolution = match (step.bump, step.occupant) {
        (BumpType::None, _) => advance(world, current, origin, taken, BumpType::None, None, view, kind),
        (BumpType::HelpIntent, Some(occupant)) => {
            if swap_target_is_free(world, origin, mover, occupant.id, view) {
                let swap = SwapRequest {
                    mover,
                    swapee: occupant.id,
                    target: origin,
                };
                advance(
                    world,
                    current,
                    origin,
                    taken,
                    BumpType::HelpIntent,
                    Some(Displacement::Swap(swap)),
                    view,
                    kind,
                )
            } else {
                stay(current, BumpType::Blocked, taken)
            }
        }
        (BumpType::Push, Some(occupant)) => {
            let pushed_traits = EntityTraits {
                help_intent: false,
                ..occupant.traits
            };
            let shove = probe(world, step.destination, taken, occupant.id, &pushed_traits, view);
            if shove.bump == BumpType::None {
                let push = Displacement::Push {
                    occupant: occupant.id,
                    to: shove.destination,
                };
                advance(world, current, origin, taken, BumpType::Push, Some(push), view, kind)
            } else {
                stay(current, BumpType::Push, taken)
            }
        }
        (bump, _) => stay(current, bump, taken),
    };

    Ok(resolution)
}

/// State of an entity moved to `to` by someone else's action. The move number
/// is left alone.
pub fn displaced<W: WorldView + ?Sized>(
    world: &W,
    current: &EntityState,
    to: TilePos,
    view: View,
) -> EntityState {
    current
        .without_flags()
        .relocated(to.to_vector(), world.frames(), view)
}

fn slide<W: WorldView + ?Sized>(
    world: &W,
    origin: TilePos,
    direction: Direction,
    mover: EntityId,
    traits: &EntityTraits,
    view: View,
) -> (Direction, Probe) {
    let diagonal = probe(world, origin, direction, mover, traits, view);
    let (Some(x_dir), Some(y_dir)) = (direction.x_component(), direction.y_component()) else {
        return (direction, diagonal);
    };
    let x = probe(world, origin, x_dir, mover, traits, view);
    let y = probe(world, origin, y_dir, mover, traits, view);

    if diagonal.bump == BumpType::None && x.bump == BumpType::None && y.bump == BumpType::None {
        return (direction, diagonal);
    }

    let preferences: [&[BumpType]; 3] = [
        &[BumpType::None, BumpType::HelpIntent],
        &[BumpType::Push],
        &[BumpType::ClosedDoor],
    ];
    for accepted in preferences {
        for (axis, candidate) in [(x_dir, x), (y_dir, y)] {
            if accepted.contains(&candidate.bump) {
                return (axis, candidate);
            }
        }
    }

    (
        direction,
        Probe {
            bump: BumpType::Blocked,
            destination: diagonal.destination,
            occupant: None,
        },
    )
}

/// The swapee lands on the mover's origin, which must be structurally open
/// and empty apart from the two participants.
fn swap_target_is_free<W: WorldView + ?Sized>(
    world: &W,
    origin: TilePos,
    mover: EntityId,
    swapee: EntityId,
    view: View,
) -> bool {
    let (frame, local) = locate(world.frames(), origin, view);
    let tiles = world.tiles();
    if tiles.is_tile_blocking(frame, local) || tiles.is_closed_door(frame, local) {
        return false;
    }
    world
        .occupants_at(origin, view)
        .iter()
        .all(|o| o.id == mover || o.id == swapee)
}

#[allow(clippy::too_many_arguments)]
fn advance<W: WorldView + ?Sized>(
    world: &W,
    current: &EntityState,
    origin: TilePos,
    direction: Direction,
    bump: BumpType,
    displacement: Option<Displacement>,
    view: View,
    kind: StepKind,
) -> Resolution {
    let target = origin.offset(direction);
    let mut state = displaced(world, current, target, view);
    match kind {
        StepKind::Input => state.move_number = current.move_number.wrapping_add(1),
        StepKind::Follow => state.is_follow_update = true,
    }
    Resolution {
        state,
        bump,
        moved: true,
        direction: Some(direction),
        displacement,
    }
}

fn stay(current: &EntityState, bump: BumpType, direction: Direction) -> Resolution {
    Resolution {
        state: *current,
        bump,
        moved: false,
        direction: Some(direction),
        displacement: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::MoveKey;
    use crate::bump::tests::TestWorld;
    use crate::bump::SizeClass;
    use crate::geometry::Vector2;
    use crate::matrix::{Frame, FrameId, FramePose, Rotation};
    use crate::tilemap::Tile;

    const MOVER: EntityId = 1;

    fn start(world: &TestWorld, x: i32, y: i32) -> EntityState {
        EntityState::at_world(Vector2::new(x as f32, y as f32), &world.frames, View::Authoritative)
    }

    fn step(world: &TestWorld, state: &EntityState, dir: (i32, i32), traits: EntityTraits) -> Resolution {
        let flags = MoveFlags::from_direction(Direction::new(dir.0, dir.1).unwrap());
        resolve(world, state, &flags, MOVER, &traits, View::Authoritative, StepKind::Input).unwrap()
    }

    fn tile_of(world: &TestWorld, state: &EntityState) -> TilePos {
        state.world_tile(&world.frames, View::Authoritative).unwrap()
    }

    #[test]
    fn test_cardinal_move_increments_move_number() {
        let world = TestWorld::default();
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), EntityTraits::player());

        assert!(res.moved);
        assert_eq!(res.bump, BumpType::None);
        assert_eq!(tile_of(&world, &res.state), TilePos::new(1, 0));
        assert_eq!(res.state.move_number, state.move_number + 1);
        // input untouched
        assert_eq!(tile_of(&world, &state), TilePos::new(0, 0));
    }

    #[test]
    fn test_blocked_move_keeps_state() {
        let mut world = TestWorld::default();
        world.wall(1, 0);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), EntityTraits::player());

        assert!(!res.moved);
        assert_eq!(res.bump, BumpType::Blocked);
        assert_eq!(res.state, state);
    }

    #[test]
    fn test_diagonal_slides_to_free_axis() {
        let mut world = TestWorld::default();
        world.wall(1, 0);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 1), EntityTraits::player());

        assert!(res.moved);
        assert_eq!(res.bump, BumpType::None);
        assert_eq!(res.direction, Some(Direction::UP));
        assert_eq!(tile_of(&world, &res.state), TilePos::new(0, 1));
    }

    #[test]
    fn test_diagonal_both_axes_blocked() {
        let mut world = TestWorld::default();
        world.wall(1, 0);
        world.wall(0, 1);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 1), EntityTraits::player());

        assert!(!res.moved);
        assert_eq!(res.bump, BumpType::Blocked);
        assert_eq!(res.state.move_number, state.move_number);
    }

    #[test]
    fn test_open_diagonal_moves_diagonally() {
        let world = TestWorld::default();
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (-1, 1), EntityTraits::player());
        assert_eq!(tile_of(&world, &res.state), TilePos::new(-1, 1));
    }

    #[test]
    fn test_diagonal_blocked_corner_prefers_x() {
        let mut world = TestWorld::default();
        world.wall(1, 1);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 1), EntityTraits::player());
        assert_eq!(res.direction, Some(Direction::RIGHT));
        assert_eq!(tile_of(&world, &res.state), TilePos::new(1, 0));
    }

    #[test]
    fn test_diagonal_prefers_push_over_door() {
        let mut world = TestWorld::default();
        world.tiles.set(FrameId::WORLD, TilePos::new(1, 0), Tile::Door { open: false });
        world.place(5, 0, 1, EntityTraits::object(SizeClass::Small));
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 1), EntityTraits::player());

        assert_eq!(res.bump, BumpType::Push);
        assert_eq!(res.direction, Some(Direction::UP));
        assert_eq!(
            res.displacement,
            Some(Displacement::Push {
                occupant: 5,
                to: TilePos::new(0, 2)
            })
        );
    }

    #[test]
    fn test_diagonal_door_on_both_axes_prefers_x() {
        let mut world = TestWorld::default();
        world.tiles.set(FrameId::WORLD, TilePos::new(1, 0), Tile::Door { open: false });
        world.tiles.set(FrameId::WORLD, TilePos::new(0, 1), Tile::Door { open: false });
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 1), EntityTraits::player());

        assert!(!res.moved);
        assert_eq!(res.bump, BumpType::ClosedDoor);
        assert_eq!(res.direction, Some(Direction::RIGHT));
    }

    #[test]
    fn test_push_into_free_tile() {
        let mut world = TestWorld::default();
        world.place(5, 1, 0, EntityTraits::object(SizeClass::Small));
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), EntityTraits::player());

        assert!(res.moved);
        assert_eq!(res.bump, BumpType::Push);
        assert_eq!(tile_of(&world, &res.state), TilePos::new(1, 0));
        assert_eq!(
            res.displacement,
            Some(Displacement::Push {
                occupant: 5,
                to: TilePos::new(2, 0)
            })
        );
    }

    #[test]
    fn test_push_blocked_behind() {
        let mut world = TestWorld::default();
        world.place(5, 1, 0, EntityTraits::object(SizeClass::Small));
        world.wall(2, 0);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), EntityTraits::player());

        assert!(!res.moved);
        assert_eq!(res.bump, BumpType::Push);
        assert_eq!(res.displacement, None);
    }

    #[test]
    fn test_swap_with_helper() {
        let mut world = TestWorld::default();
        world.place(2, 1, 0, EntityTraits::player().with_help_intent(true));
        let helper = EntityTraits::player().with_help_intent(true);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), helper);

        assert!(res.moved);
        assert_eq!(res.bump, BumpType::HelpIntent);
        assert_eq!(
            res.displacement,
            Some(Displacement::Swap(SwapRequest {
                mover: MOVER,
                swapee: 2,
                target: TilePos::new(0, 0)
            }))
        );
    }

    #[test]
    fn test_swap_rejected_when_origin_invalid() {
        let mut world = TestWorld::default();
        world.place(2, 1, 0, EntityTraits::player().with_help_intent(true));
        world.tiles.set(FrameId::WORLD, TilePos::new(0, 0), Tile::Door { open: false });
        let helper = EntityTraits::player().with_help_intent(true);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), helper);

        assert!(!res.moved);
        assert_eq!(res.bump, BumpType::Blocked);
        assert_eq!(res.state, state);
    }

    #[test]
    fn test_incorporeal_ignores_walls() {
        let mut world = TestWorld::default();
        world.wall(1, 0);
        let state = start(&world, 0, 0);
        let res = step(&world, &state, (1, 0), EntityTraits::ghost());
        assert!(res.moved);
        assert_eq!(res.bump, BumpType::None);
        assert_eq!(tile_of(&world, &res.state), TilePos::new(1, 0));
    }

    #[test]
    fn test_follow_step_keeps_move_number() {
        let world = TestWorld::default();
        let mut state = start(&world, -1, 0);
        state.move_number = 4;
        let flags = MoveFlags::from_keys(&[MoveKey::Right]);
        let res = resolve(
            &world,
            &state,
            &flags,
            MOVER,
            &EntityTraits::object(SizeClass::Medium),
            View::Authoritative,
            StepKind::Follow,
        )
        .unwrap();

        assert_eq!(res.state.move_number, 4);
        assert!(res.state.is_follow_update);
        assert_eq!(tile_of(&world, &res.state), TilePos::new(0, 0));
    }

    #[test]
    fn test_rejections() {
        let world = TestWorld::default();
        let flags = MoveFlags::from_keys(&[MoveKey::Up]);
        let err = resolve(
            &world,
            &EntityState::HIDDEN,
            &flags,
            MOVER,
            &EntityTraits::player(),
            View::Authoritative,
            StepKind::Input,
        )
        .unwrap_err();
        assert_eq!(err, SyncError::RejectedAction(RejectReason::Hidden));

        let state = start(&world, 0, 0);
        let err = resolve(
            &world,
            &state,
            &MoveFlags::default(),
            MOVER,
            &EntityTraits::player(),
            View::Authoritative,
            StepKind::Input,
        )
        .unwrap_err();
        assert_eq!(err, SyncError::RejectedAction(RejectReason::NoDirection));
    }

    #[test]
    fn test_entering_frame_changes_parent() {
        let mut world = TestWorld::default();
        world.frames.register(Frame::new(
            FrameId(2),
            4,
            4,
            FramePose {
                origin: Vector2::new(1.0, 0.0),
                rotation: Rotation::Clockwise,
            },
        ));
        // world (1,0) is local (0,0) of the rotated frame; world (0,0) is outside
        let state = start(&world, 0, 0);
        assert_eq!(state.frame, FrameId::WORLD);
        let res = step(&world, &state, (1, 0), EntityTraits::player());

        assert_eq!(res.state.frame, FrameId(2));
        assert_eq!(res.state.position, Vector2::new(0.0, 0.0));
        assert_eq!(tile_of(&world, &res.state), TilePos::new(1, 0));
    }
}
