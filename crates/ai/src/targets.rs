//! Built-in target selectors.

use blockworld_common::EntityId;

use crate::context::AiContext;
use crate::controller::TargetSelector;

/// Closest living entity within `range`, optionally restricted to some kinds.
#[derive(Debug, Clone)]
pub struct ClosestEntityTarget {
    range: f64,
    kinds: Vec<String>,
}

impl ClosestEntityTarget {
    /// Match any kind within `range`; narrow with [`Self::with_kinds`].
    pub fn new(range: f64) -> Self {
        Self {
            range,
            kinds: Vec::new(),
        }
    }

    /// Only consider entities of the given kinds.
    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }
}

impl TargetSelector for ClosestEntityTarget {
    fn find_target(&mut self, ctx: &AiContext<'_>) -> Option<EntityId> {
        let instance = ctx.instance?;
        ctx.world
            .entities_near(instance, ctx.position, self.range)
            .into_iter()
            .filter(|e| e.alive && e.id != ctx.entity)
            .filter(|e| self.kinds.is_empty() || self.kinds.contains(&e.kind))
            .min_by(|a, b| {
                let da = a.position.distance_squared(ctx.position);
                let db = b.position.distance_squared(ctx.position);
                da.total_cmp(&db).then(a.id.cmp(&b.id))
            })
            .map(|e| e.id)
    }
}

/// The entity that last attacked us, while it stays alive and within `range`.
#[derive(Debug, Clone)]
pub struct LastAttackerTarget {
    range: f64,
}

impl LastAttackerTarget {
    /// Track the last attacker while it is within `range`.
    pub fn new(range: f64) -> Self {
        Self { range }
    }
}

impl TargetSelector for LastAttackerTarget {
    fn find_target(&mut self, ctx: &AiContext<'_>) -> Option<EntityId> {
        let attacker_id = ctx.world.entity(ctx.entity)?.last_attacker?;
        let attacker = ctx.world.entity(attacker_id)?;
        let in_reach = attacker.alive
            && attacker.instance.is_some()
            && attacker.instance == ctx.instance
            && attacker.position.distance(ctx.position) <= self.range;
        in_reach.then_some(attacker_id)
    }
}
