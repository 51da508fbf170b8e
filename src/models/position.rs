use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid coordinate of a track piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring cell one step in `direction`
    ///
    /// Wraps at the edge of the coordinate range.
    #[must_use]
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.delta();
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// The region column this position falls in for the given region width
    #[must_use]
    pub fn region(self, region_size: i32) -> RegionKey {
        let size = region_size.max(1);
        RegionKey {
            x: self.x.div_euclid(size),
            z: self.z.div_euclid(size),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A square column of the grid that the host loads and unloads as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub x: i32,
    pub z: i32,
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Direction of travel between adjacent grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Unit step as (dx, dy, dz). North is -z, East is +x.
    #[must_use]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
        }
    }

    /// Direction leading from `from` to `to` if they are adjacent cells
    #[must_use]
    pub fn between(from: Position, to: Position) -> Option<Self> {
        Self::ALL.into_iter().find(|dir| from.offset(*dir) == to)
    }

    #[must_use]
    pub fn as_connection(self) -> Connections {
        match self {
            Direction::North => Connections::NORTH,
            Direction::South => Connections::SOUTH,
            Direction::East => Connections::EAST,
            Direction::West => Connections::WEST,
            Direction::Up => Connections::UP,
            Direction::Down => Connections::DOWN,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of directions a track piece connects towards
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Connections: u8 {
        const NORTH = 1 << 0;
        const SOUTH = 1 << 1;
        const EAST = 1 << 2;
        const WEST = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
    }
}

impl Connections {
    /// All four level directions, as used by a flat crossing or turntable
    pub const LEVEL: Connections = Connections::NORTH
        .union(Connections::SOUTH)
        .union(Connections::EAST)
        .union(Connections::WEST);

    #[must_use]
    pub fn has(self, direction: Direction) -> bool {
        self.contains(direction.as_connection())
    }

    /// Directions in this set, in `Direction::ALL` order
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |dir| self.has(*dir))
    }
}

impl From<Direction> for Connections {
    fn from(direction: Direction) -> Self {
        direction.as_connection()
    }
}

impl FromIterator<Direction> for Connections {
    fn from_iter<T: IntoIterator<Item = Direction>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Connections::empty(), |acc, dir| acc | dir.as_connection())
    }
}
