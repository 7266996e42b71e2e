//! Structural tile layer: walls, doors and airlocks per frame.
//!
//! This is the read-mostly geometry the bump classifier consults. It changes
//! only when the map does (a wall destroyed, a door opened), so servers keep it
//! behind a reader/writer lock and clients keep a copy updated by packets.

use crate::error::SyncError;
use crate::geometry::TilePos;
use crate::matrix::FrameId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Tile {
    /// Open space with no floor. Passable.
    #[default]
    Space,
    Floor,
    Wall,
    /// Interactable door; a closed one is bumped open rather than walked through.
    Door { open: bool },
    /// Sealed barrier. Closed airlocks block like walls.
    Airlock { open: bool },
}

impl Tile {
    pub fn is_blocking(self) -> bool {
        matches!(self, Tile::Wall | Tile::Airlock { open: false })
    }

    pub fn is_closed_door(self) -> bool {
        matches!(self, Tile::Door { open: false })
    }

    fn from_char(c: char) -> Option<Tile> {
        match c {
            ' ' => Some(Tile::Space),
            '.' => Some(Tile::Floor),
            '#' => Some(Tile::Wall),
            'D' => Some(Tile::Door { open: false }),
            'd' => Some(Tile::Door { open: true }),
            'A' => Some(Tile::Airlock { open: false }),
            'a' => Some(Tile::Airlock { open: true }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileMap {
    layers: BTreeMap<FrameId, HashMap<TilePos, Tile>>,
}

impl TileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a world-frame map.
    pub fn parse(text: &str) -> Result<TileMap, SyncError> {
        let mut map = TileMap::new();
        map.parse_layer(FrameId::WORLD, text)?;
        Ok(map)
    }

    /// Parses an ASCII layer into `frame`. The last line is local row 0, so the
    /// text reads the same way it is drawn with y pointing up.
    ///
    /// ```text
    /// #####
    /// #..D.
    /// #####
    /// ```
    pub fn parse_layer(&mut self, frame: FrameId, text: &str) -> Result<(), SyncError> {
        let lines: Vec<&str> = text.lines().collect();
        let height = lines.len() as i32;

        for (row, line) in lines.iter().enumerate() {
            let y = height - 1 - row as i32;
            for (column, c) in line.chars().enumerate() {
                let tile = Tile::from_char(c).ok_or(SyncError::MapParse {
                    line: row + 1,
                    column: column + 1,
                    found: c,
                })?;
                if tile != Tile::Space {
                    self.set(frame, TilePos::new(column as i32, y), tile);
                }
            }
        }
        Ok(())
    }

    pub fn set(&mut self, frame: FrameId, pos: TilePos, tile: Tile) {
        let layer = self.layers.entry(frame).or_default();
        if tile == Tile::Space {
            layer.remove(&pos);
        } else {
            layer.insert(pos, tile);
        }
    }

    pub fn get(&self, frame: FrameId, pos: TilePos) -> Tile {
        self.layers
            .get(&frame)
            .and_then(|layer| layer.get(&pos))
            .copied()
            .unwrap_or_default()
    }

    /// Structural blockage: walls and sealed airlocks.
    pub fn is_tile_blocking(&self, frame: FrameId, pos: TilePos) -> bool {
        self.get(frame, pos).is_blocking()
    }

    pub fn is_closed_door(&self, frame: FrameId, pos: TilePos) -> bool {
        self.get(frame, pos).is_closed_door()
    }

    /// Opens or closes a door or airlock. Returns false when the tile is not
    /// one.
    pub fn set_door(&mut self, frame: FrameId, pos: TilePos, open: bool) -> bool {
        let tile = match self.get(frame, pos) {
            Tile::Door { .. } => Tile::Door { open },
            Tile::Airlock { .. } => Tile::Airlock { open },
            _ => return false,
        };
        self.set(frame, pos, tile);
        true
    }

    /// Non-space tiles of one frame.
    pub fn layer(&self, frame: FrameId) -> impl Iterator<Item = (TilePos, Tile)> + '_ {
        self.layers
            .get(&frame)
            .into_iter()
            .flat_map(|layer| layer.iter().map(|(pos, tile)| (*pos, *tile)))
    }

    pub fn tile_count(&self) -> usize {
        self.layers.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "#####\n#..D.\n#A#a#";

    #[test]
    fn test_parse_layer_orientation() {
        let map = TileMap::parse(ROOM).unwrap();

        // bottom line is row 0
        assert_eq!(map.get(FrameId::WORLD, TilePos::new(1, 0)), Tile::Airlock { open: false });
        assert_eq!(map.get(FrameId::WORLD, TilePos::new(3, 0)), Tile::Airlock { open: true });
        assert_eq!(map.get(FrameId::WORLD, TilePos::new(3, 1)), Tile::Door { open: false });
        assert_eq!(map.get(FrameId::WORLD, TilePos::new(0, 2)), Tile::Wall);
        assert_eq!(map.get(FrameId::WORLD, TilePos::new(9, 9)), Tile::Space);
    }

    #[test]
    fn test_blocking_and_doors() {
        let mut map = TileMap::new();
        map.parse_layer(FrameId::WORLD, ROOM).unwrap();

        assert!(map.is_tile_blocking(FrameId::WORLD, TilePos::new(0, 1)));
        assert!(map.is_tile_blocking(FrameId::WORLD, TilePos::new(1, 0)));
        assert!(!map.is_tile_blocking(FrameId::WORLD, TilePos::new(3, 0)));
        assert!(!map.is_tile_blocking(FrameId::WORLD, TilePos::new(3, 1)));
        assert!(map.is_closed_door(FrameId::WORLD, TilePos::new(3, 1)));

        assert!(map.set_door(FrameId::WORLD, TilePos::new(3, 1), true));
        assert!(!map.is_closed_door(FrameId::WORLD, TilePos::new(3, 1)));
        assert!(!map.set_door(FrameId::WORLD, TilePos::new(1, 1), true));
    }

    #[test]
    fn test_layers_are_per_frame() {
        let mut map = TileMap::new();
        map.set(FrameId(1), TilePos::new(0, 0), Tile::Wall);
        assert!(map.is_tile_blocking(FrameId(1), TilePos::new(0, 0)));
        assert!(!map.is_tile_blocking(FrameId::WORLD, TilePos::new(0, 0)));
    }

    #[test]
    fn test_parse_error_position() {
        let mut map = TileMap::new();
        let err = map.parse_layer(FrameId::WORLD, "##\n#x").unwrap_err();
        assert_eq!(
            err,
            SyncError::MapParse {
                line: 2,
                column: 2,
                found: 'x'
            }
        );
    }

    #[test]
    fn test_bincode_round_trip() {
        let mut map = TileMap::new();
        map.parse_layer(FrameId::WORLD, ROOM).unwrap();
        let bytes = bincode::serialize(&map).unwrap();
        let decoded: TileMap = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(decoded.tile_count(), 15);
    }
}
