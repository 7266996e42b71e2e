use crate::geometry::Direction;
use crate::state::EntityId;
use serde::{Deserialize, Serialize};

/// One held movement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKey {
    Up,
    Down,
    Left,
    Right,
}

/// Set of held movement keys sampled in one input frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveFlags {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveFlags {
    pub fn from_keys(keys: &[MoveKey]) -> Self {
        let mut flags = MoveFlags::default();
        for key in keys {
            match key {
                MoveKey::Up => flags.up = true,
                MoveKey::Down => flags.down = true,
                MoveKey::Left => flags.left = true,
                MoveKey::Right => flags.right = true,
            }
        }
        flags
    }

    pub fn from_direction(direction: Direction) -> Self {
        MoveFlags {
            up: direction.y() > 0,
            down: direction.y() < 0,
            left: direction.x() < 0,
            right: direction.x() > 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }

    /// Grid direction of the held keys. Opposing keys cancel, so holding only
    /// left and right yields no direction.
    pub fn direction(&self) -> Option<Direction> {
        let x = self.right as i32 - self.left as i32;
        let y = self.up as i32 - self.down as i32;
        Direction::new(x, y)
    }
}

/// Movement request for one entity. Sent by clients and generated internally
/// for pull follow-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    pub entity: EntityId,
    /// Expected to be exactly one past the last accepted move of `entity`.
    pub sequence: u32,
    pub flags: MoveFlags,
    pub is_follow_update: bool,
}

impl MoveAction {
    pub fn new(entity: EntityId, sequence: u32, flags: MoveFlags) -> Self {
        Self {
            entity,
            sequence,
            flags,
            is_follow_update: false,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        self.flags.direction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_keys() {
        let flags = MoveFlags::from_keys(&[MoveKey::Up, MoveKey::Right]);
        assert_eq!(flags.direction(), Direction::new(1, 1));

        let flags = MoveFlags::from_keys(&[MoveKey::Down]);
        assert_eq!(flags.direction(), Some(Direction::DOWN));
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let flags = MoveFlags::from_keys(&[MoveKey::Left, MoveKey::Right]);
        assert!(!flags.is_empty());
        assert_eq!(flags.direction(), None);

        let flags = MoveFlags::from_keys(&[MoveKey::Left, MoveKey::Right, MoveKey::Up]);
        assert_eq!(flags.direction(), Some(Direction::UP));
    }

    #[test]
    fn test_from_direction_round_trips() {
        let diagonal = Direction::new(-1, -1).unwrap();
        assert_eq!(MoveFlags::from_direction(diagonal).direction(), Some(diagonal));
        assert!(MoveFlags::default().is_empty());
    }
}
