use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use blockworld_common::{BlockPos, CHUNK_SIZE, ChunkPos};

use crate::block::BlockState;
use crate::store::SpaceError;

/// Shared, independently lockable chunk.
pub type ChunkHandle = Arc<RwLock<Chunk>>;

/// Vertical extent of every chunk in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    /// Lowest valid block y (inclusive).
    pub min_y: i32,
    /// Number of block layers above `min_y`.
    pub height: i32,
}

impl ChunkBounds {
    /// Whether `y` lies within the bounds.
    pub fn contains_y(&self, y: i32) -> bool {
        y >= self.min_y && y < self.min_y + self.height
    }

    /// First y above the bounds (exclusive).
    pub fn max_y(&self) -> i32 {
        self.min_y + self.height
    }
}

impl Default for ChunkBounds {
    fn default() -> Self {
        Self {
            min_y: -64,
            height: 384,
        }
    }
}

/// A 16x16 column of block states.
///
/// Storage is sparse: unset positions read as air. The storage layout is not
/// part of the public contract; callers only see `block` / `set_block`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pos: ChunkPos,
    bounds: ChunkBounds,
    blocks: HashMap<(u8, i32, u8), BlockState>,
}

impl Chunk {
    /// Empty (all air) chunk.
    pub fn new(pos: ChunkPos, bounds: ChunkBounds) -> Self {
        Self {
            pos,
            bounds,
            blocks: HashMap::new(),
        }
    }

    /// Chunk coordinates.
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Vertical bounds of this chunk.
    pub fn bounds(&self) -> ChunkBounds {
        self.bounds
    }

    /// Number of non-air blocks stored.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn local_key(pos: BlockPos) -> (u8, i32, u8) {
        (
            pos.x.rem_euclid(CHUNK_SIZE) as u8,
            pos.y,
            pos.z.rem_euclid(CHUNK_SIZE) as u8,
        )
    }

    /// Block at an absolute position inside this chunk. Positions outside the
    /// vertical bounds read as air.
    pub fn block(&self, pos: BlockPos) -> BlockState {
        debug_assert_eq!(pos.chunk(), self.pos, "block {pos} is not in chunk {:?}", self.pos);
        self.blocks
            .get(&Self::local_key(pos))
            .cloned()
            .unwrap_or_default()
    }

    /// Solidity of the block at `pos` without cloning its state.
    pub fn is_solid(&self, pos: BlockPos) -> bool {
        self.blocks
            .get(&Self::local_key(pos))
            .is_some_and(BlockState::is_solid)
    }

    /// Store `state` at `pos`, returning the previous state.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Result<BlockState, SpaceError> {
        if pos.chunk() != self.pos {
            return Err(SpaceError::WrongChunk {
                pos,
                chunk: self.pos,
            });
        }
        if !self.bounds.contains_y(pos.y) {
            return Err(SpaceError::OutOfBounds {
                pos,
                min_y: self.bounds.min_y,
                max_y: self.bounds.max_y(),
            });
        }
        let key = Self::local_key(pos);
        let previous = if state.is_air() {
            self.blocks.remove(&key)
        } else {
            self.blocks.insert(key, state)
        };
        Ok(previous.unwrap_or_default())
    }
}
