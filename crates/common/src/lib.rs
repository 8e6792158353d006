//! Shared types for the blockworld workspace: entity and instance ids,
//! block/chunk coordinates and the six block faces.

mod coords;
mod types;

pub use coords::{BlockFace, BlockPos, CHUNK_SIZE, CHUNK_SHIFT, ChunkPos, Direction};
pub use types::{EntityId, InstanceId};
