use std::collections::BTreeMap;

use glam::DVec3;

use blockworld_common::{EntityId, InstanceId};

use crate::navigator::Navigator;

/// Read-only view of another entity, as seen by goals and target selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: String,
    pub position: DVec3,
    pub instance: Option<InstanceId>,
    pub alive: bool,
    pub last_attacker: Option<EntityId>,
}

/// Entity lookups available to AI code during a tick.
///
/// The world hands AI a consistent view taken at the start of the tick, so
/// selectors never observe half-updated neighbors.
pub trait EntityQuery: Sync {
    fn entity(&self, id: EntityId) -> Option<EntityView>;

    /// Entities in `instance` within `radius` of `center`.
    fn entities_near(&self, instance: InstanceId, center: DVec3, radius: f64) -> Vec<EntityView>;

    fn is_alive(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|e| e.alive)
    }
}

/// Plain map snapshot of entities, keyed in deterministic order.
impl EntityQuery for BTreeMap<EntityId, EntityView> {
    fn entity(&self, id: EntityId) -> Option<EntityView> {
        self.get(&id).cloned()
    }

    fn entities_near(&self, instance: InstanceId, center: DVec3, radius: f64) -> Vec<EntityView> {
        let radius_sq = radius * radius;
        self.values()
            .filter(|e| e.instance == Some(instance) && e.position.distance_squared(center) <= radius_sq)
            .cloned()
            .collect()
    }
}

/// Side effects requested by goals. The world turns them into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    Attack { target: EntityId, swing_hand: bool },
}

/// Everything a goal or target selector may touch while its entity ticks.
pub struct AiContext<'a> {
    pub entity: EntityId,
    pub instance: Option<InstanceId>,
    pub position: DVec3,
    pub tick: u64,
    pub navigator: &'a mut Navigator,
    pub target: &'a mut Option<EntityId>,
    pub world: &'a dyn EntityQuery,
    actions: &'a mut Vec<AiAction>,
}

impl<'a> AiContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity: EntityId,
        instance: Option<InstanceId>,
        position: DVec3,
        tick: u64,
        navigator: &'a mut Navigator,
        target: &'a mut Option<EntityId>,
        world: &'a dyn EntityQuery,
        actions: &'a mut Vec<AiAction>,
    ) -> Self {
        Self {
            entity,
            instance,
            position,
            tick,
            navigator,
            target,
            world,
            actions,
        }
    }

    /// The current target, if it is still alive and in the same instance.
    pub fn target_view(&self) -> Option<EntityView> {
        let target = self.world.entity((*self.target)?)?;
        (target.alive && target.instance.is_some() && target.instance == self.instance).then_some(target)
    }

    /// Request an attack on `target`, optionally swinging the main hand.
    pub fn attack(&mut self, target: EntityId, swing_hand: bool) {
        self.actions.push(AiAction::Attack { target, swing_hand });
    }
}
