use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use blockworld_common::{BlockFace, BlockPos, EntityId};
use blockworld_space::{BlockQuery, BlockState, SpaceError, SpatialStore};

use crate::rule::BlockPlacementRule;

/// Bound on recompute rounds when a block or its neighborhood is contended.
const MAX_REFRESH_ATTEMPTS: usize = 8;

/// Errors from committing block changes.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// Registry of placement rules keyed by block name, and the driver that
/// commits block changes and propagates them to neighbors.
///
/// Blocks without a registered rule are stored as given and never refreshed.
#[derive(Default, Clone)]
pub struct BlockRuleEngine {
    rules: HashMap<String, Arc<dyn BlockPlacementRule>>,
}

impl fmt::Debug for BlockRuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("BlockRuleEngine").field("rules", &names).finish()
    }
}

impl BlockRuleEngine {
    /// Engine with no rules; every block is stored verbatim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` for its block name, replacing any previous rule.
    pub fn register(&mut self, rule: impl BlockPlacementRule + 'static) {
        self.register_shared(Arc::new(rule));
    }

    /// Register an already shared rule.
    pub fn register_shared(&mut self, rule: Arc<dyn BlockPlacementRule>) {
        let name = rule.block_name().to_owned();
        if self.rules.insert(name.clone(), rule).is_some() {
            tracing::warn!(block = %name, "replacing placement rule");
        }
    }

    /// Rule for a block name.
    pub fn rule_for(&self, block: &str) -> Option<&Arc<dyn BlockPlacementRule>> {
        self.rules.get(block)
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Place `candidate` at `pos` as if clicked against `face` by `actor`.
    ///
    /// The rule's `block_place` runs first and may alter the candidate; the
    /// result is committed, refreshed from its neighborhood, and then every
    /// neighbor-sensitive neighbor is refreshed. Returns the state stored at
    /// `pos` afterwards.
    pub fn place_block(
        &self,
        space: &SpatialStore,
        pos: BlockPos,
        candidate: BlockState,
        face: BlockFace,
        actor: Option<EntityId>,
    ) -> Result<BlockState, RuleError> {
        let placed = match self.rule_for(candidate.name()) {
            Some(rule) => rule.block_place(space, candidate, face, pos, actor),
            None => candidate,
        };
        tracing::debug!(%pos, block = %placed, ?face, "placing block");
        self.commit(space, pos, placed)
    }

    /// Replace the block at `pos` outside of a placement (no validation hook),
    /// then propagate exactly like a placement.
    pub fn set_block(
        &self,
        space: &SpatialStore,
        pos: BlockPos,
        block: BlockState,
    ) -> Result<BlockState, RuleError> {
        self.commit(space, pos, block)
    }

    fn commit(
        &self,
        space: &SpatialStore,
        pos: BlockPos,
        block: BlockState,
    ) -> Result<BlockState, RuleError> {
        space.set_block(pos, block.clone())?;
        self.refresh(space, pos)?;
        self.update_neighbors(space, pos)?;
        Ok(space.block(pos).unwrap_or(block))
    }

    /// Recompute the block at `pos` from its rule and write the result back.
    ///
    /// The write only lands if the block is still the one the update was
    /// computed from. After every write, or when another writer changed the
    /// block in between, the block and its neighborhood are read again and the
    /// update recomputed, until recomputing leaves the stored state unchanged.
    /// A neighbor that changed while the update was being computed is thus
    /// never lost. Returns whether the stored state changed.
    pub fn refresh(&self, space: &SpatialStore, pos: BlockPos) -> Result<bool, RuleError> {
        let mut changed = false;
        for _ in 0..MAX_REFRESH_ATTEMPTS {
            let Some(current) = space.block(pos) else {
                return Ok(changed);
            };
            let Some(rule) = self.rule_for(current.name()) else {
                return Ok(changed);
            };
            let updated = rule.block_update(space, pos, &current);
            if updated == current {
                return Ok(changed);
            }
            match space.compare_and_set(pos, &current, updated) {
                Ok(true) => {
                    tracing::trace!(%pos, "refreshed block");
                    changed = true;
                }
                Ok(false) => {}
                // Unloaded between the read and the write.
                Err(SpaceError::ChunkNotLoaded { .. }) => return Ok(changed),
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!(%pos, "block kept changing under refresh, giving up");
        Ok(changed)
    }

    /// Refresh every face-adjacent block whose rule is neighbor-sensitive.
    /// Returns how many of them changed.
    pub fn update_neighbors(&self, space: &SpatialStore, pos: BlockPos) -> Result<usize, RuleError> {
        let mut changed = 0;
        for neighbor in pos.neighbors() {
            let sensitive = space
                .block(neighbor)
                .and_then(|state| self.rule_for(state.name()).map(|r| r.neighbor_sensitive()))
                .unwrap_or(false);
            if sensitive && self.refresh(space, neighbor)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
