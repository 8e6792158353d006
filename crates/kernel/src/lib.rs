//! World Kernel: authoritative world state, creature ticking, entity lifecycle.
//!
//! # Invariants
//! - Per creature and tick, behavior selection runs before navigation.
//! - Creatures that are not alive are never ticked; a dying creature only
//!   waits for its scheduled removal.
//! - Removing an entity clears every other creature's target pointing at it.
//! - All state mutations flow through explicit operations and are logged as
//!   [`WorldEvent`]s.

mod config;
mod entity;
mod error;
mod tick;
pub mod world;

pub use config::WorldConfig;
pub use entity::{Creature, Entity, Lifecycle};
pub use error::KernelError;
pub use tick::CreatureTick;
pub use world::{Instance, World, WorldEvent, WorldSummary};
