use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use blockworld_common::{BlockPos, ChunkPos};

use crate::block::BlockState;
use crate::chunk::{Chunk, ChunkBounds, ChunkHandle};

/// Errors from block writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceError {
    #[error("chunk {chunk:?} owning block {pos} is not loaded")]
    ChunkNotLoaded { pos: BlockPos, chunk: ChunkPos },
    #[error("block {pos} is outside the vertical bounds [{min_y}, {max_y})")]
    OutOfBounds { pos: BlockPos, min_y: i32, max_y: i32 },
    #[error("block {pos} does not belong to chunk {chunk:?}")]
    WrongChunk { pos: BlockPos, chunk: ChunkPos },
}

/// Read-only spatial query capability handed to path providers and block rules.
///
/// Implementors only need `chunk`; the block-level queries lock the owning
/// chunk for the duration of a single read and release it before returning.
pub trait BlockQuery: Send + Sync {
    /// The chunk at `pos`, or `None` when it is not loaded.
    fn chunk(&self, pos: ChunkPos) -> Option<ChunkHandle>;

    /// Block state at `pos`, or `None` when the owning chunk is not loaded.
    fn block(&self, pos: BlockPos) -> Option<BlockState> {
        let handle = self.chunk(pos.chunk())?;
        let chunk = read_chunk(&handle);
        Some(chunk.block(pos))
    }

    /// Whether the block at `pos` is solid. An unloaded chunk answers `false`.
    fn is_solid(&self, pos: BlockPos) -> bool {
        let Some(handle) = self.chunk(pos.chunk()) else {
            return false;
        };
        let chunk = read_chunk(&handle);
        chunk.is_solid(pos)
    }
}

impl<T: BlockQuery + ?Sized> BlockQuery for Arc<T> {
    fn chunk(&self, pos: ChunkPos) -> Option<ChunkHandle> {
        (**self).chunk(pos)
    }

    fn block(&self, pos: BlockPos) -> Option<BlockState> {
        (**self).block(pos)
    }

    fn is_solid(&self, pos: BlockPos) -> bool {
        (**self).is_solid(pos)
    }
}

// A writer that panicked mid-update leaves a chunk whose map is still
// structurally valid, so poisoned guards are recovered instead of propagated.
fn read_chunk(handle: &ChunkHandle) -> RwLockReadGuard<'_, Chunk> {
    handle.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_chunk(handle: &ChunkHandle) -> RwLockWriteGuard<'_, Chunk> {
    handle.write().unwrap_or_else(PoisonError::into_inner)
}

/// Chunk-partitioned block storage for one instance.
///
/// The chunk table has its own lock, held only long enough to clone a chunk
/// handle out of it; block access then locks that one chunk. No operation
/// holds two chunk locks at once.
#[derive(Debug, Default)]
pub struct SpatialStore {
    bounds: ChunkBounds,
    chunks: RwLock<HashMap<ChunkPos, ChunkHandle>>,
}

impl SpatialStore {
    /// Empty store; chunks are created by `load_chunk`.
    pub fn new(bounds: ChunkBounds) -> Self {
        Self {
            bounds,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Vertical bounds of every chunk.
    pub fn bounds(&self) -> ChunkBounds {
        self.bounds
    }

    /// Load (create) the chunk at `pos`. Loading an already-loaded chunk
    /// returns the existing handle.
    pub fn load_chunk(&self, pos: ChunkPos) -> ChunkHandle {
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        chunks
            .entry(pos)
            .or_insert_with(|| {
                tracing::debug!(?pos, "loading chunk");
                Arc::new(RwLock::new(Chunk::new(pos, self.bounds)))
            })
            .clone()
    }

    /// Load every chunk in the inclusive rectangle `from..=to`.
    pub fn load_area(&self, from: ChunkPos, to: ChunkPos) {
        for x in from.x.min(to.x)..=from.x.max(to.x) {
            for z in from.z.min(to.z)..=from.z.max(to.z) {
                self.load_chunk(ChunkPos::new(x, z));
            }
        }
    }

    /// Unload the chunk at `pos`. Outstanding handles stay valid but are no
    /// longer reachable through the store.
    pub fn unload_chunk(&self, pos: ChunkPos) -> bool {
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        let removed = chunks.remove(&pos).is_some();
        if removed {
            tracing::debug!(?pos, "unloading chunk");
        }
        removed
    }

    /// Whether the chunk at `pos` is loaded.
    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&pos)
    }

    /// Number of loaded chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn loaded_chunk(&self, pos: BlockPos) -> Result<ChunkHandle, SpaceError> {
        let chunk = pos.chunk();
        self.chunk(chunk)
            .ok_or(SpaceError::ChunkNotLoaded { pos, chunk })
    }

    /// Write `state` at `pos` under the owning chunk's lock, returning the
    /// previous state.
    pub fn set_block(&self, pos: BlockPos, state: BlockState) -> Result<BlockState, SpaceError> {
        let handle = self.loaded_chunk(pos)?;
        let mut chunk = write_chunk(&handle);
        chunk.set_block(pos, state)
    }

    /// Write `new` at `pos` only if the stored state still equals `expected`.
    /// The comparison and the write happen under one chunk lock acquisition.
    pub fn compare_and_set(
        &self,
        pos: BlockPos,
        expected: &BlockState,
        new: BlockState,
    ) -> Result<bool, SpaceError> {
        let handle = self.loaded_chunk(pos)?;
        let mut chunk = write_chunk(&handle);
        if chunk.block(pos) != *expected {
            return Ok(false);
        }
        chunk.set_block(pos, new)?;
        Ok(true)
    }

    /// Run `f` with the owning chunk read-locked. The lock is released when
    /// `f` returns, on every path. `None` when the chunk is not loaded.
    pub fn with_chunk<R>(&self, pos: ChunkPos, f: impl FnOnce(&Chunk) -> R) -> Option<R> {
        let handle = self.chunk(pos)?;
        let chunk = read_chunk(&handle);
        Some(f(&chunk))
    }
}

impl BlockQuery for SpatialStore {
    fn chunk(&self, pos: ChunkPos) -> Option<ChunkHandle> {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pos)
            .cloned()
    }
}
