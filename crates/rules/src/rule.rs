use blockworld_common::{BlockFace, BlockPos, EntityId};
use blockworld_space::{BlockQuery, BlockState};

/// Strategy recomputing a block type's derived state.
///
/// One instance exists per block type and is shared by every block of that
/// type, so implementations carry no per-block state.
pub trait BlockPlacementRule: Send + Sync {
    /// Name of the block type this rule applies to.
    fn block_name(&self) -> &str;

    /// Recompute `block` at `pos` from its neighborhood. Returns a new state.
    fn block_update(&self, world: &dyn BlockQuery, pos: BlockPos, block: &BlockState) -> BlockState;

    /// Validate or transform a block about to be placed against `face`.
    ///
    /// Rejection is expressed by returning the candidate unchanged.
    fn block_place(
        &self,
        world: &dyn BlockQuery,
        candidate: BlockState,
        face: BlockFace,
        pos: BlockPos,
        actor: Option<EntityId>,
    ) -> BlockState {
        let _ = (world, face, pos, actor);
        candidate
    }

    /// Whether a change next to this block should re-run `block_update` on it.
    fn neighbor_sensitive(&self) -> bool {
        true
    }
}
