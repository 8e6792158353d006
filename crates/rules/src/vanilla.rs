use blockworld_common::{BlockFace, BlockPos, Direction, EntityId};
use blockworld_space::{BlockQuery, BlockState};

use crate::rule::BlockPlacementRule;

/// Wall blocks connect to every solid horizontal neighbor.
///
/// Each cardinal side reads `low` when the neighbor is solid and `none`
/// otherwise. `up` is always `true` and `waterlogged` always `false`.
#[derive(Debug, Clone)]
pub struct WallPlacementRule {
    block: String,
}

impl WallPlacementRule {
    /// Wall rule for blocks named `block`.
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
        }
    }

    // Each call locks only the neighbor's chunk, then releases it.
    fn side(world: &dyn BlockQuery, pos: BlockPos, direction: Direction) -> &'static str {
        if world.is_solid(pos.relative(direction)) {
            "low"
        } else {
            "none"
        }
    }
}

impl BlockPlacementRule for WallPlacementRule {
    fn block_name(&self) -> &str {
        &self.block
    }

    fn block_update(&self, world: &dyn BlockQuery, pos: BlockPos, block: &BlockState) -> BlockState {
        let east = Self::side(world, pos, Direction::East);
        let west = Self::side(world, pos, Direction::West);
        let south = Self::side(world, pos, Direction::South);
        let north = Self::side(world, pos, Direction::North);

        block.with_properties([
            ("east", east),
            ("north", north),
            ("south", south),
            ("west", west),
            ("up", "true"),
            ("waterlogged", "false"),
        ])
    }
}

/// Pillar-like blocks (logs, basalt) take their `axis` from the clicked face.
#[derive(Debug, Clone)]
pub struct AxisPlacementRule {
    block: String,
}

impl AxisPlacementRule {
    /// Axis rule for blocks named `block`.
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
        }
    }
}

impl BlockPlacementRule for AxisPlacementRule {
    fn block_name(&self) -> &str {
        &self.block
    }

    fn block_update(&self, _world: &dyn BlockQuery, _pos: BlockPos, block: &BlockState) -> BlockState {
        block.clone()
    }

    fn block_place(
        &self,
        _world: &dyn BlockQuery,
        candidate: BlockState,
        face: BlockFace,
        _pos: BlockPos,
        _actor: Option<EntityId>,
    ) -> BlockState {
        let axis = match face {
            BlockFace::Top | BlockFace::Bottom => "y",
            BlockFace::North | BlockFace::South => "z",
            BlockFace::West | BlockFace::East => "x",
        };
        candidate.with_property("axis", axis)
    }

    fn neighbor_sensitive(&self) -> bool {
        false
    }
}
