//! Spatial storage: world blocks partitioned into independently lockable chunks.
//!
//! # Invariants
//! - Every read or write of a block state goes through its owning chunk's lock.
//! - At most one chunk lock is held at a time by any operation in this crate.
//! - A query into an unloaded chunk is answered as "absent" / "not solid",
//!   never as an error.

mod block;
mod chunk;
mod store;

pub use block::BlockState;
pub use chunk::{Chunk, ChunkBounds, ChunkHandle};
pub use store::{BlockQuery, SpaceError, SpatialStore};
