use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and depth of a chunk, in blocks.
pub const CHUNK_SIZE: i32 = 16;
/// `log2(CHUNK_SIZE)`, used to resolve the owning chunk with a shift.
pub const CHUNK_SHIFT: i32 = 4;

/// Integer coordinate of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    /// Block at the given coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block containing a continuous world position.
    pub fn containing(pos: DVec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// Position shifted by the given deltas.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The adjacent block in `direction`.
    pub fn relative(self, direction: Direction) -> Self {
        let d = direction.offset();
        self.offset(d.x, d.y, d.z)
    }

    /// All six face-adjacent neighbors, in `Direction::ALL` order.
    pub fn neighbors(self) -> [BlockPos; 6] {
        Direction::ALL.map(|d| self.relative(d))
    }

    /// The chunk owning this block.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::containing(self.x, self.z)
    }

    /// Center of the block's bottom face, where an entity standing on it sits.
    pub fn bottom_center(self) -> DVec3 {
        DVec3::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Horizontal coordinate of a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Chunk at the given chunk coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk owning block column (`block_x`, `block_z`). Arithmetic shift keeps
    /// negative coordinates in the right chunk (-1 -> chunk -1, not 0).
    pub const fn containing(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x >> CHUNK_SHIFT,
            z: block_z >> CHUNK_SHIFT,
        }
    }

    /// Chunk owning a continuous world position.
    pub fn of_position(pos: DVec3) -> Self {
        BlockPos::containing(pos).chunk()
    }

    /// Square group of `size` x `size` chunks this chunk falls in.
    pub fn region(self, size: i32) -> (i32, i32) {
        let size = size.max(1);
        (self.x.div_euclid(size), self.z.div_euclid(size))
    }

    /// Block coordinate of this chunk's minimum corner at `y`.
    pub fn min_block(self, y: i32) -> BlockPos {
        BlockPos::new(self.x << CHUNK_SHIFT, y, self.z << CHUNK_SHIFT)
    }
}

/// The six axis directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    pub const HORIZONTAL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Unit offset. North is -z, east is +x.
    pub const fn offset(self) -> IVec3 {
        match self {
            Direction::Down => IVec3::new(0, -1, 0),
            Direction::Up => IVec3::new(0, 1, 0),
            Direction::North => IVec3::new(0, 0, -1),
            Direction::South => IVec3::new(0, 0, 1),
            Direction::West => IVec3::new(-1, 0, 0),
            Direction::East => IVec3::new(1, 0, 0),
        }
    }

    /// Lower-case name, as used for block property keys.
    pub const fn name(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        }
    }

    /// Direction pointing the other way.
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

/// Face of a block that was clicked when placing against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockFace {
    Bottom,
    Top,
    North,
    South,
    West,
    East,
}

impl BlockFace {
    /// Direction the face points in.
    pub const fn direction(self) -> Direction {
        match self {
            BlockFace::Bottom => Direction::Down,
            BlockFace::Top => Direction::Up,
            BlockFace::North => Direction::North,
            BlockFace::South => Direction::South,
            BlockFace::West => Direction::West,
            BlockFace::East => Direction::East,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_resolution_handles_negatives() {
        assert_eq!(ChunkPos::containing(0, 0), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(15, 15), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(16, -1), ChunkPos::new(1, -1));
        assert_eq!(ChunkPos::containing(-16, -17), ChunkPos::new(-1, -2));
    }

    #[test]
    fn block_containing_floors() {
        let pos = BlockPos::containing(DVec3::new(-0.5, 64.9, 3.2));
        assert_eq!(pos, BlockPos::new(-1, 64, 3));
    }

    #[test]
    fn neighbors_are_face_adjacent() {
        let origin = BlockPos::new(0, 0, 0);
        for (n, d) in origin.neighbors().iter().zip(Direction::ALL) {
            let o = d.offset();
            assert_eq!(*n, BlockPos::new(o.x, o.y, o.z));
            assert_eq!(n.relative(d.opposite()), origin);
        }
    }

    #[test]
    fn region_groups_chunks() {
        assert_eq!(ChunkPos::new(3, 3).region(4), (0, 0));
        assert_eq!(ChunkPos::new(4, -1).region(4), (1, -1));
        assert_eq!(ChunkPos::new(7, 7).region(0), (7, 7));
    }

    #[test]
    fn face_maps_to_direction() {
        assert_eq!(BlockFace::Top.direction(), Direction::Up);
        assert_eq!(BlockFace::West.direction(), Direction::West);
    }
}
