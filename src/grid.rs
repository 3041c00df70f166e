//! Placement-grid primitives: cells, the four cardinal rotations, and the
//! drag-direction rule that maps a pointer offset to a rotation.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::DEADZONE_CELLS;

/// A cell on the placement grid. `z` grows toward north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    #[must_use]
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Offset `(dx, dz)` from `origin` to this cell.
    #[must_use]
    pub fn offset_from(self, origin: Cell) -> (i32, i32) {
        (self.x - origin.x, self.z - origin.z)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// One of the four cardinal rotations, clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    North,
    East,
    /// Host default facing for freshly selected placements.
    #[default]
    South,
    West,
}

impl Rotation {
    const ALL: [Rotation; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Clockwise quarter turns from north (0..=3).
    #[must_use]
    pub fn as_index(self) -> u8 {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Rotation for a quarter-turn count; wraps modulo 4.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_index(index: i32) -> Self {
        // rem_euclid keeps negative counts in range.
        Self::ALL[index.rem_euclid(4) as usize]
    }

    /// Rotate by `quarter_turns` (positive = clockwise).
    #[must_use]
    pub fn turned(self, quarter_turns: i32) -> Self {
        Self::from_index(i32::from(self.as_index()) + quarter_turns)
    }

    /// Lowercase name, as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no rotation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rotation '{0}' (expected north, east, south or west)")]
pub struct ParseRotationError(pub String);

impl FromStr for Rotation {
    type Err = ParseRotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Self::North),
            "east" | "e" => Ok(Self::East),
            "south" | "s" => Ok(Self::South),
            "west" | "w" => Ok(Self::West),
            _ => Err(ParseRotationError(s.to_string())),
        }
    }
}

/// Whether an offset from the pin lies inside the no-rotation deadzone.
#[must_use]
pub fn in_deadzone(dx: i32, dz: i32) -> bool {
    dx.abs() <= DEADZONE_CELLS && dz.abs() <= DEADZONE_CELLS
}

/// Dominant-axis direction for a drag offset.
///
/// Ties go to the horizontal axis. Returns `None` for a zero offset.
#[must_use]
pub fn direction_from_delta(dx: i32, dz: i32) -> Option<Rotation> {
    if dx == 0 && dz == 0 {
        return None;
    }
    let rotation = if dx.abs() >= dz.abs() {
        if dx >= 0 { Rotation::East } else { Rotation::West }
    } else if dz >= 0 {
        Rotation::North
    } else {
        Rotation::South
    };
    Some(rotation)
}

/// Rotation a pointer at `pointer` requests for a gesture pinned at `pin`,
/// or `None` while it stays inside the deadzone.
#[must_use]
pub fn drag_rotation(pin: Cell, pointer: Cell) -> Option<Rotation> {
    let (dx, dz) = pointer.offset_from(pin);
    if in_deadzone(dx, dz) {
        return None;
    }
    direction_from_delta(dx, dz)
}
