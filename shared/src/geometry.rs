use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is up.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Snaps to the nearest tile. Halves round away from zero.
    pub fn round_to_tile(&self) -> TilePos {
        TilePos::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Integer cell on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, direction: Direction) -> TilePos {
        TilePos::new(self.x + direction.x(), self.y + direction.y())
    }

    pub fn to_vector(&self) -> Vector2 {
        Vector2::new(self.x as f32, self.y as f32)
    }

    /// King-move distance: diagonal neighbours are at distance 1.
    pub fn chebyshev_distance(&self, other: &TilePos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// True for the eight surrounding tiles and the tile itself.
    pub fn is_adjacent(&self, other: &TilePos) -> bool {
        self.chebyshev_distance(other) <= 1
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single grid step. Both components lie in {-1, 0, 1} and are never both zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    x: i8,
    y: i8,
}

impl Direction {
    pub const UP: Direction = Direction { x: 0, y: 1 };
    pub const DOWN: Direction = Direction { x: 0, y: -1 };
    pub const LEFT: Direction = Direction { x: -1, y: 0 };
    pub const RIGHT: Direction = Direction { x: 1, y: 0 };

    /// Returns None for the zero vector or any component outside {-1, 0, 1}.
    pub fn new(x: i32, y: i32) -> Option<Direction> {
        if !(-1..=1).contains(&x) || !(-1..=1).contains(&y) || (x == 0 && y == 0) {
            return None;
        }
        Some(Direction {
            x: x as i8,
            y: y as i8,
        })
    }

    /// Step that leads from `from` to the neighbouring tile `to`.
    pub fn between(from: TilePos, to: TilePos) -> Option<Direction> {
        Direction::new(to.x - from.x, to.y - from.y)
    }

    pub fn x(&self) -> i32 {
        self.x as i32
    }

    pub fn y(&self) -> i32 {
        self.y as i32
    }

    pub fn is_diagonal(&self) -> bool {
        self.x != 0 && self.y != 0
    }

    pub fn x_component(&self) -> Option<Direction> {
        Direction::new(self.x(), 0)
    }

    pub fn y_component(&self) -> Option<Direction> {
        Direction::new(0, self.y())
    }

    pub fn opposite(&self) -> Direction {
        Direction {
            x: -self.x,
            y: -self.y,
        }
    }

    pub fn to_vector(&self) -> Vector2 {
        Vector2::new(self.x as f32, self.y as f32)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.x, self.y)
    }
}
