//! Block rules: derive a block's state from its neighborhood.
//!
//! # Invariants
//! - Placement validation (`block_place`) happens-before the first `block_update`
//!   of the placed block.
//! - `block_update` never mutates a neighbor; it only reads neighbor solidity.
//! - Neighbor reads lock each neighbor's chunk independently.

mod engine;
mod rule;
mod vanilla;

pub use engine::{BlockRuleEngine, RuleError};
pub use rule::BlockPlacementRule;
pub use vanilla::{AxisPlacementRule, WallPlacementRule};
