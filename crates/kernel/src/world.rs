use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use blockworld_ai::{
    AiAction, AiCapable, DirectPathFactory, EntityView, NavigationOutcome, PathProviderFactory,
    PathingEntity,
};
use blockworld_common::{BlockFace, BlockPos, EntityId, InstanceId};
use blockworld_rules::BlockRuleEngine;
use blockworld_space::{BlockState, SpatialStore};

use crate::config::WorldConfig;
use crate::entity::{Creature, Entity, Lifecycle};
use crate::error::KernelError;
use crate::tick::{self, CreatureTick};

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    Spawned {
        id: EntityId,
        kind: String,
        position: DVec3,
        instance: Option<InstanceId>,
    },
    InstanceChanged {
        id: EntityId,
        from: Option<InstanceId>,
        to: InstanceId,
    },
    Killed { id: EntityId },
    RemovalScheduled { id: EntityId, remove_at_ms: u64 },
    Removed { id: EntityId },
    GoalChanged {
        id: EntityId,
        from: Option<String>,
        to: Option<String>,
    },
    TargetChanged {
        id: EntityId,
        target: Option<EntityId>,
    },
    /// Navigation ended this tick, by arriving or giving up.
    PathFinished { id: EntityId, arrived: bool },
    SwingMainHand { id: EntityId },
    Attack { source: EntityId, target: EntityId },
    /// A creature's AI failed; its goal and route were cleared.
    AiFault { id: EntityId, reason: String },
    BlockPlaced {
        instance: InstanceId,
        pos: BlockPos,
        state: BlockState,
    },
    /// Simulation advanced one tick.
    Stepped { tick: u64, time_ms: u64 },
}

/// A block space entities can live in.
#[derive(Debug, Clone)]
pub struct Instance {
    id: InstanceId,
    space: Arc<SpatialStore>,
}

impl Instance {
    /// Instance id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Block storage of this instance.
    pub fn space(&self) -> &Arc<SpatialStore> {
        &self.space
    }
}

/// The authoritative world state.
///
/// All mutations go through explicit operations and are logged. Entities
/// live in a BTreeMap so iteration and ticking order are deterministic.
pub struct World {
    config: WorldConfig,
    instances: BTreeMap<InstanceId, Instance>,
    entities: BTreeMap<EntityId, Entity>,
    rules: BlockRuleEngine,
    path_factory: Arc<dyn PathProviderFactory>,
    tick: u64,
    time_ms: u64,
    /// Append-only event log of all mutations.
    event_log: Vec<WorldEvent>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("time_ms", &self.time_ms)
            .field("instances", &self.instances.len())
            .field("entities", &self.entities.len())
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Create an empty world using straight-line path providers.
    pub fn new(config: WorldConfig) -> Self {
        let factory = DirectPathFactory {
            max_stalled_steps: config.max_stalled_steps,
        };
        Self::with_path_factory(config, Arc::new(factory))
    }

    /// World with a custom path provider factory.
    pub fn with_path_factory(config: WorldConfig, path_factory: Arc<dyn PathProviderFactory>) -> Self {
        Self {
            config,
            instances: BTreeMap::new(),
            entities: BTreeMap::new(),
            rules: BlockRuleEngine::new(),
            path_factory,
            tick: 0,
            time_ms: 0,
            event_log: Vec::new(),
        }
    }

    /// Active world configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds since the world started.
    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    /// Placement rules applied by [`World::place_block`].
    pub fn rules(&self) -> &BlockRuleEngine {
        &self.rules
    }

    /// Mutable access for registering placement rules.
    pub fn rules_mut(&mut self) -> &mut BlockRuleEngine {
        &mut self.rules
    }

    // -- instances --

    /// Create an empty instance and return its id.
    pub fn create_instance(&mut self) -> InstanceId {
        let id = InstanceId::new();
        let space = Arc::new(SpatialStore::new(self.config.chunk_bounds()));
        self.instances.insert(id, Instance { id, space });
        tracing::info!(instance = ?id, "instance created");
        id
    }

    /// Look up an instance.
    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    /// All instances in id order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Shared handle to an instance's block storage.
    pub fn space(&self, id: InstanceId) -> Result<Arc<SpatialStore>, KernelError> {
        self.instances
            .get(&id)
            .map(|i| Arc::clone(&i.space))
            .ok_or(KernelError::UnknownInstance(id))
    }

    /// Place `block` as if clicked against `face`, running placement rules
    /// and refreshing neighbors.
    pub fn place_block(
        &mut self,
        instance: InstanceId,
        pos: BlockPos,
        block: BlockState,
        face: BlockFace,
        actor: Option<EntityId>,
    ) -> Result<BlockState, KernelError> {
        let space = self.space(instance)?;
        let state = self.rules.place_block(&space, pos, block, face, actor)?;
        self.event_log.push(WorldEvent::BlockPlaced {
            instance,
            pos,
            state: state.clone(),
        });
        Ok(state)
    }

    // -- entities --

    /// Number of entities, dying ones included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Read-only access to all entities (BTreeMap for deterministic iteration).
    pub fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    /// Get a reference to entity data.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to entity data.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// The creature part of `id`, or an error for plain or unknown entities.
    pub fn creature_mut(&mut self, id: EntityId) -> Result<&mut Creature, KernelError> {
        self.entities
            .get_mut(&id)
            .ok_or(KernelError::UnknownEntity(id))?
            .creature
            .as_mut()
            .ok_or(KernelError::NotACreature(id))
    }

    /// Spawn a plain entity. Returns its id.
    pub fn spawn(
        &mut self,
        kind: impl Into<String>,
        position: DVec3,
        instance: Option<InstanceId>,
    ) -> Result<EntityId, KernelError> {
        let id = EntityId::new();
        self.spawn_with_id(id, kind, position, instance)?;
        Ok(id)
    }

    /// Spawn a plain entity with a specific id (used for replay).
    pub fn spawn_with_id(
        &mut self,
        id: EntityId,
        kind: impl Into<String>,
        position: DVec3,
        instance: Option<InstanceId>,
    ) -> Result<(), KernelError> {
        self.insert(Entity::new(id, kind.into(), position, None), instance)
    }

    /// Spawn an AI-driven creature with the configured movement speed and
    /// removal delay.
    pub fn spawn_creature(
        &mut self,
        kind: impl Into<String>,
        position: DVec3,
        instance: Option<InstanceId>,
        size: PathingEntity,
    ) -> Result<EntityId, KernelError> {
        let id = EntityId::new();
        self.spawn_creature_with_id(id, kind, position, instance, size)?;
        Ok(id)
    }

    /// Spawn a creature under a caller-chosen id. Fails if the id is taken.
    pub fn spawn_creature_with_id(
        &mut self,
        id: EntityId,
        kind: impl Into<String>,
        position: DVec3,
        instance: Option<InstanceId>,
        size: PathingEntity,
    ) -> Result<(), KernelError> {
        let mut entity = Entity::new(id, kind.into(), position, None);
        entity.movement_speed = self.config.default_movement_speed;
        entity.creature = Some(Creature::new(size, self.config.removal_animation_delay_ms));
        self.insert(entity, instance)
    }

    fn insert(&mut self, entity: Entity, instance: Option<InstanceId>) -> Result<(), KernelError> {
        if self.entities.contains_key(&entity.id) {
            return Err(KernelError::DuplicateEntity(entity.id));
        }
        if let Some(instance) = instance {
            if !self.instances.contains_key(&instance) {
                return Err(KernelError::UnknownInstance(instance));
            }
        }
        let id = entity.id;
        self.event_log.push(WorldEvent::Spawned {
            id,
            kind: entity.kind.clone(),
            position: entity.position,
            instance,
        });
        self.entities.insert(id, entity);
        if let Some(instance) = instance {
            self.set_instance(id, instance)?;
        }
        Ok(())
    }

    /// Move an entity into `instance`. A creature's navigator gets a fresh
    /// path provider for the new instance before this returns.
    pub fn set_instance(&mut self, id: EntityId, instance: InstanceId) -> Result<(), KernelError> {
        let space = self.space(instance)?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(KernelError::UnknownEntity(id))?;
        let from = entity.instance.replace(instance);
        if let Some(creature) = entity.creature.as_mut() {
            let (_, navigator) = creature.parts_mut();
            let provider = self
                .path_factory
                .create(navigator.pathing_entity(), instance, space);
            navigator.set_path_provider(provider);
        }
        self.event_log.push(WorldEvent::InstanceChanged { id, from, to: instance });
        Ok(())
    }

    /// Teleport an entity. Any route it had is kept.
    pub fn set_position(&mut self, id: EntityId, position: DVec3) -> Result<(), KernelError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(KernelError::UnknownEntity(id))?;
        entity.position = position;
        Ok(())
    }

    /// Removal delay of a creature, in milliseconds.
    pub fn removal_animation_delay(&self, id: EntityId) -> Result<u64, KernelError> {
        let entity = self.entities.get(&id).ok_or(KernelError::UnknownEntity(id))?;
        entity
            .creature
            .as_ref()
            .map(Creature::removal_animation_delay)
            .ok_or(KernelError::NotACreature(id))
    }

    /// Change a creature's removal delay. Applies to later kills only.
    pub fn set_removal_animation_delay(&mut self, id: EntityId, delay_ms: u64) -> Result<(), KernelError> {
        self.creature_mut(id)?.set_removal_animation_delay(delay_ms);
        Ok(())
    }

    /// Kill an entity. Creatures with a removal delay become dying and are
    /// removed once the delay elapses; everything else is removed now.
    /// Killing an entity that is already dying does nothing.
    pub fn kill(&mut self, id: EntityId) -> Result<(), KernelError> {
        let entity = self.entities.get(&id).ok_or(KernelError::UnknownEntity(id))?;
        if !entity.is_alive() {
            return Ok(());
        }
        let delay = entity
            .creature
            .as_ref()
            .map_or(0, Creature::removal_animation_delay);
        self.event_log.push(WorldEvent::Killed { id });
        tracing::debug!(entity = %id, delay_ms = delay, "entity killed");
        if delay > 0 {
            self.schedule_removal(id, delay)
        } else {
            self.remove(id).map(|_| ())
        }
    }

    /// Mark an entity dying and remove it `delay_ms` from now. Delays past
    /// the end of the clock never fire.
    pub fn schedule_removal(&mut self, id: EntityId, delay_ms: u64) -> Result<(), KernelError> {
        let remove_at_ms = self.time_ms.saturating_add(delay_ms);
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(KernelError::UnknownEntity(id))?;
        entity.lifecycle = Lifecycle::Dying { remove_at_ms };
        self.event_log
            .push(WorldEvent::RemovalScheduled { id, remove_at_ms });
        Ok(())
    }

    /// Remove an entity from the world now. Creatures targeting it forget
    /// their target.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, KernelError> {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(KernelError::UnknownEntity(id))?;
        entity.lifecycle = Lifecycle::Removed;
        if let Some(creature) = entity.creature.as_mut() {
            let (_, navigator) = creature.parts_mut();
            navigator.clear_path_provider();
        }

        for other in self.entities.values_mut() {
            let Some(creature) = other.creature.as_mut() else {
                continue;
            };
            if creature.behavior_mut().forget_target(id) {
                self.event_log.push(WorldEvent::TargetChanged {
                    id: other.id,
                    target: None,
                });
            }
        }
        self.event_log.push(WorldEvent::Removed { id });
        Ok(entity)
    }

    /// `source` attacks `target`, optionally swinging its main hand first.
    pub fn attack(&mut self, source: EntityId, target: EntityId, swing_hand: bool) -> Result<(), KernelError> {
        if !self.entities.contains_key(&source) {
            return Err(KernelError::UnknownEntity(source));
        }
        let victim = self
            .entities
            .get_mut(&target)
            .ok_or(KernelError::UnknownEntity(target))?;
        victim.last_attacker = Some(source);
        if swing_hand {
            self.event_log.push(WorldEvent::SwingMainHand { id: source });
        }
        self.event_log.push(WorldEvent::Attack { source, target });
        Ok(())
    }

    // -- stepping --

    /// Read-only views of every entity, as AI sees them during a tick.
    pub fn snapshot(&self) -> BTreeMap<EntityId, EntityView> {
        self.entities.iter().map(|(id, e)| (*id, e.view())).collect()
    }

    /// Advance the simulation by one tick, updating entities in id order.
    pub fn step(&mut self) {
        self.step_with(false);
    }

    /// Advance by one tick, updating each (instance, region) group on the
    /// rayon pool. Produces the same state and events as [`World::step`].
    pub fn step_parallel(&mut self) {
        self.step_with(true);
    }

    fn step_with(&mut self, parallel: bool) {
        self.tick += 1;
        self.time_ms += self.config.tick_millis;
        let _span = tracing::info_span!("world_step", tick = self.tick, parallel).entered();

        self.process_due_removals();

        let snapshot = self.snapshot();
        let results = if parallel {
            tick::tick_parallel(
                &mut self.entities,
                &snapshot,
                self.tick,
                self.config.region_size_chunks,
            )
        } else {
            tick::tick_sequential(&mut self.entities, &snapshot, self.tick)
        };
        self.apply_results(results);

        self.event_log.push(WorldEvent::Stepped {
            tick: self.tick,
            time_ms: self.time_ms,
        });
    }

    fn process_due_removals(&mut self) {
        let due: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| matches!(e.lifecycle, Lifecycle::Dying { remove_at_ms } if remove_at_ms <= self.time_ms))
            .map(|e| e.id)
            .collect();
        for id in due {
            if let Err(err) = self.remove(id) {
                tracing::warn!(entity = %id, %err, "scheduled removal failed");
            }
        }
    }

    fn apply_results(&mut self, results: Vec<CreatureTick>) {
        let mut attacks = Vec::new();
        for result in results {
            let id = result.id;
            if let Some(reason) = result.fault {
                self.event_log.push(WorldEvent::AiFault { id, reason });
                continue;
            }
            if let Some(target) = result.report.target_change {
                self.event_log.push(WorldEvent::TargetChanged { id, target });
            }
            if let Some(switch) = result.report.goal_switch {
                self.event_log.push(WorldEvent::GoalChanged {
                    id,
                    from: switch.from,
                    to: switch.to,
                });
            }
            match result.navigation {
                NavigationOutcome::Arrived => {
                    self.event_log.push(WorldEvent::PathFinished { id, arrived: true });
                }
                NavigationOutcome::Unreachable => {
                    self.event_log.push(WorldEvent::PathFinished { id, arrived: false });
                }
                _ => {}
            }
            for action in result.report.actions {
                match action {
                    AiAction::Attack { target, swing_hand } => attacks.push((id, target, swing_hand)),
                }
            }
        }
        for (source, target, swing_hand) in attacks {
            if let Err(err) = self.attack(source, target, swing_hand) {
                tracing::warn!(%source, %target, %err, "attack dropped");
            }
        }
    }

    // -- events --

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Compute a deterministic hash of entity state, in canonical (BTreeMap)
    /// order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        for (id, entity) in &self.entities {
            mix(&mut h, id.0.as_bytes());
            mix(&mut h, &entity.position.x.to_le_bytes());
            mix(&mut h, &entity.position.y.to_le_bytes());
            mix(&mut h, &entity.position.z.to_le_bytes());
            mix(&mut h, &entity.age_ticks.to_le_bytes());
            let goal = entity
                .creature
                .as_ref()
                .and_then(|c| c.current_goal())
                .map_or("", |g| g.name());
            mix(&mut h, goal.as_bytes());
        }
        h
    }

    /// Counts for display.
    pub fn summary(&self) -> WorldSummary {
        let creatures = self.entities.values().filter(|e| e.is_creature()).count();
        let dying = self
            .entities
            .values()
            .filter(|e| matches!(e.lifecycle, Lifecycle::Dying { .. }))
            .count();
        WorldSummary {
            tick: self.tick,
            time_ms: self.time_ms,
            instances: self.instances.len(),
            entity_count: self.entities.len(),
            creatures,
            dying,
            pending_events: self.event_log.len(),
        }
    }
}

/// Summary of world state for tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSummary {
    pub tick: u64,
    pub time_ms: u64,
    pub instances: usize,
    pub entity_count: usize,
    pub creatures: usize,
    pub dying: usize,
    pub pending_events: usize,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: tick={} time={}ms instances={} entities={} creatures={} dying={} pending_events={}",
            self.tick,
            self.time_ms,
            self.instances,
            self.entity_count,
            self.creatures,
            self.dying,
            self.pending_events
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockworld_ai::goals::{FollowTargetGoal, MeleeAttackGoal, RandomStrollGoal};
    use blockworld_ai::targets::ClosestEntityTarget;
    use blockworld_ai::{AiContext, GoalSelector, Navigable, PathProvider, PathStep};
    use blockworld_common::ChunkPos;
    use blockworld_rules::WallPlacementRule;
    use blockworld_space::BlockQuery;

    fn world_with_ground() -> (World, InstanceId) {
        let mut world = World::default();
        let instance = world.create_instance();
        let space = world.space(instance).unwrap();
        space.load_area(ChunkPos::new(-4, -4), ChunkPos::new(4, 4));
        (world, instance)
    }

    fn zombie(world: &mut World, instance: InstanceId, at: DVec3) -> EntityId {
        world
            .spawn_creature("zombie", at, Some(instance), PathingEntity::default())
            .unwrap()
    }

    /// Always-eligible goal that walks toward a fixed spot.
    #[derive(Debug)]
    struct WalkTo(DVec3);

    impl GoalSelector for WalkTo {
        fn name(&self) -> &str {
            "walk_to"
        }

        fn should_start(&mut self, _ctx: &mut AiContext<'_>) -> bool {
            true
        }

        fn start(&mut self, ctx: &mut AiContext<'_>) {
            ctx.navigator.set_path_to(self.0);
        }

        fn tick(&mut self, _ctx: &mut AiContext<'_>) {}
    }

    #[test]
    fn world_starts_empty() {
        let w = World::default();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.time_ms(), 0);
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn spawn_into_unknown_instance_fails() {
        let mut w = World::default();
        let err = w.spawn("arrow", DVec3::ZERO, Some(InstanceId::new())).unwrap_err();
        assert!(matches!(err, KernelError::UnknownInstance(_)));
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn step_advances_clock_and_logs() {
        let mut w = World::default();
        w.step();
        w.step();
        assert_eq!(w.tick(), 2);
        assert_eq!(w.time_ms(), 100);
        assert_eq!(
            w.events().last(),
            Some(&WorldEvent::Stepped { tick: 2, time_ms: 100 })
        );
    }

    #[test]
    fn kill_with_delay_schedules_removal() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        w.drain_events();

        w.kill(id).unwrap();
        assert_eq!(
            w.events(),
            &[
                WorldEvent::Killed { id },
                WorldEvent::RemovalScheduled { id, remove_at_ms: 1000 },
            ]
        );
        assert_eq!(w.get(id).unwrap().lifecycle(), Lifecycle::Dying { remove_at_ms: 1000 });

        for _ in 0..19 {
            w.step();
        }
        assert!(w.get(id).is_some(), "still dying at 950ms");
        w.step();
        assert!(w.get(id).is_none());
        assert!(w.events().contains(&WorldEvent::Removed { id }));
    }

    #[test]
    fn kill_without_delay_removes_immediately() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        w.set_removal_animation_delay(id, 0).unwrap();
        w.drain_events();

        w.kill(id).unwrap();
        assert!(w.get(id).is_none());
        assert_eq!(
            w.events(),
            &[WorldEvent::Killed { id }, WorldEvent::Removed { id }]
        );
    }

    #[test]
    fn plain_entities_die_at_once() {
        let mut w = World::default();
        let id = w.spawn("arrow", DVec3::ZERO, None).unwrap();
        assert!(matches!(
            w.removal_animation_delay(id),
            Err(KernelError::NotACreature(_))
        ));
        w.kill(id).unwrap();
        assert!(w.get(id).is_none());
    }

    #[test]
    fn huge_removal_delay_saturates() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        w.step();
        w.set_removal_animation_delay(id, u64::MAX).unwrap();

        w.kill(id).unwrap();
        assert_eq!(w.get(id).unwrap().lifecycle(), Lifecycle::Dying { remove_at_ms: u64::MAX });
        for _ in 0..5 {
            w.step();
        }
        assert!(w.get(id).is_some());
    }

    #[test]
    fn killing_twice_is_a_no_op() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        w.kill(id).unwrap();
        let logged = w.events().len();
        w.kill(id).unwrap();
        assert_eq!(w.events().len(), logged);
    }

    #[test]
    fn dying_creatures_stop_thinking() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        w.creature_mut(id)
            .unwrap()
            .behavior_mut()
            .add_goal(WalkTo(DVec3::new(5.5, 0.0, 0.5)));
        w.kill(id).unwrap();

        let before = w.get(id).unwrap().position();
        w.step();
        let entity = w.get(id).unwrap();
        assert_eq!(entity.position(), before);
        assert_eq!(entity.age(), 0);
        assert!(entity.creature().unwrap().current_goal().is_none());
    }

    #[test]
    fn creature_without_goals_stays_put() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        for _ in 0..10 {
            w.step();
        }
        let entity = w.get(id).unwrap();
        assert_eq!(entity.position(), DVec3::new(0.5, 0.0, 0.5));
        assert_eq!(entity.age(), 10);
    }

    #[test]
    fn goal_then_navigation_moves_creature_same_tick() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        w.creature_mut(id)
            .unwrap()
            .behavior_mut()
            .add_goal(WalkTo(DVec3::new(5.5, 0.0, 0.5)));
        w.step();

        let x = w.get(id).unwrap().position().x;
        assert!((x - 0.6).abs() < 1e-9, "moved on the tick the goal started: {x}");
        assert!(w.events().contains(&WorldEvent::GoalChanged {
            id,
            from: None,
            to: Some("walk_to".into()),
        }));
    }

    #[test]
    fn walking_into_a_wall_gives_up() {
        let (mut w, instance) = world_with_ground();
        let space = w.space(instance).unwrap();
        for y in 0..3 {
            space
                .set_block(BlockPos::new(2, y, 0), BlockState::new("stone", true))
                .unwrap();
        }
        let id = zombie(&mut w, instance, DVec3::new(1.5, 0.0, 0.5));
        w.get_mut(id).unwrap().set_movement_speed(1.0);
        w.creature_mut(id)
            .unwrap()
            .behavior_mut()
            .add_goal(WalkTo(DVec3::new(5.5, 0.0, 0.5)));
        w.step();

        assert_eq!(w.get(id).unwrap().position(), DVec3::new(1.5, 0.0, 0.5));
        assert!(w.events().contains(&WorldEvent::PathFinished { id, arrived: false }));
    }

    #[test]
    fn removal_clears_targets_of_others() {
        let (mut w, instance) = world_with_ground();
        let hunter = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        let prey = w
            .spawn("player", DVec3::new(3.5, 0.0, 0.5), Some(instance))
            .unwrap();
        w.creature_mut(hunter).unwrap().behavior_mut().set_target(Some(prey));

        w.remove(prey).unwrap();
        let creature = w.get(hunter).unwrap().creature().unwrap();
        assert_eq!(creature.target(), None);
        assert!(w.events().contains(&WorldEvent::TargetChanged {
            id: hunter,
            target: None
        }));
    }

    #[test]
    fn dying_target_is_dropped_on_next_tick() {
        let (mut w, instance) = world_with_ground();
        let hunter = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        let prey = zombie(&mut w, instance, DVec3::new(3.5, 0.0, 0.5));
        w.creature_mut(hunter).unwrap().behavior_mut().set_target(Some(prey));
        w.kill(prey).unwrap();
        w.step();
        assert_eq!(w.get(hunter).unwrap().creature().unwrap().target(), None);
    }

    #[test]
    fn set_instance_rebinds_path_provider() {
        let (mut w, first) = world_with_ground();
        let second = w.create_instance();
        let id = zombie(&mut w, first, DVec3::ZERO);
        assert_eq!(w.get(id).unwrap().creature().unwrap().navigator().instance(), Some(first));

        w.set_instance(id, second).unwrap();
        let entity = w.get(id).unwrap();
        assert_eq!(entity.instance(), Some(second));
        assert_eq!(entity.creature().unwrap().navigator().instance(), Some(second));
        assert!(w.events().contains(&WorldEvent::InstanceChanged {
            id,
            from: Some(first),
            to: second
        }));
    }

    #[test]
    fn set_instance_rejects_unknown_instance() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        let err = w.set_instance(id, InstanceId::new()).unwrap_err();
        assert!(matches!(err, KernelError::UnknownInstance(_)));
        assert_eq!(w.get(id).unwrap().instance(), Some(instance));
    }

    #[derive(Debug)]
    struct Recording(InstanceId);

    impl PathProvider for Recording {
        fn instance(&self) -> InstanceId {
            self.0
        }

        fn advance(&mut self, _position: DVec3, _destination: DVec3, _speed: f64) -> PathStep {
            PathStep::Delta(DVec3::new(0.0, 0.0, 1.0))
        }
    }

    struct RecordingFactory;

    impl PathProviderFactory for RecordingFactory {
        fn create(
            &self,
            _entity: PathingEntity,
            instance: InstanceId,
            _space: Arc<dyn BlockQuery>,
        ) -> Box<dyn PathProvider> {
            Box::new(Recording(instance))
        }
    }

    #[test]
    fn custom_path_factory_is_used() {
        let mut w = World::with_path_factory(WorldConfig::default(), Arc::new(RecordingFactory));
        let instance = w.create_instance();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        w.creature_mut(id)
            .unwrap()
            .behavior_mut()
            .add_goal(WalkTo(DVec3::new(9.0, 0.0, 0.0)));
        w.step();
        assert_eq!(w.get(id).unwrap().position(), DVec3::new(0.0, 0.0, 1.0));
    }

    #[derive(Debug)]
    struct Faulty;

    impl GoalSelector for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn should_start(&mut self, _ctx: &mut AiContext<'_>) -> bool {
            true
        }

        fn tick(&mut self, _ctx: &mut AiContext<'_>) {
            panic!("broken goal");
        }
    }

    #[test]
    fn ai_fault_is_isolated_to_one_creature() {
        let (mut w, instance) = world_with_ground();
        let broken = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        let healthy = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 8.5));
        w.creature_mut(broken).unwrap().behavior_mut().add_goal(Faulty);
        w.creature_mut(healthy)
            .unwrap()
            .behavior_mut()
            .add_goal(WalkTo(DVec3::new(5.5, 0.0, 8.5)));

        w.step();
        assert!(w
            .events()
            .iter()
            .any(|e| matches!(e, WorldEvent::AiFault { id, .. } if *id == broken)));
        assert!(w.get(broken).unwrap().is_alive());
        assert!(w.get(healthy).unwrap().position().x > 0.5);
    }

    #[test]
    fn melee_attack_emits_swing_then_attack() {
        let (mut w, instance) = world_with_ground();
        let hunter = zombie(&mut w, instance, DVec3::new(0.5, 0.0, 0.5));
        let prey = w
            .spawn("player", DVec3::new(1.5, 0.0, 0.5), Some(instance))
            .unwrap();
        {
            let behavior = w.creature_mut(hunter).unwrap().behavior_mut();
            behavior.add_goal(MeleeAttackGoal::new(0, 2.0, 20, 1.0));
            behavior.add_target_selector(ClosestEntityTarget::new(16.0).with_kinds(["player"]));
        }
        w.drain_events();
        w.step();

        let events = w.drain_events();
        let swing = events
            .iter()
            .position(|e| *e == WorldEvent::SwingMainHand { id: hunter })
            .unwrap();
        let attack = events
            .iter()
            .position(|e| *e == WorldEvent::Attack { source: hunter, target: prey })
            .unwrap();
        assert!(swing < attack);
        assert_eq!(w.get(prey).unwrap().last_attacker(), Some(hunter));
    }

    #[test]
    fn attack_validates_both_entities() {
        let (mut w, instance) = world_with_ground();
        let id = zombie(&mut w, instance, DVec3::ZERO);
        let ghost = EntityId::new();
        assert!(matches!(w.attack(id, ghost, true), Err(KernelError::UnknownEntity(g)) if g == ghost));
        assert!(matches!(w.attack(ghost, id, true), Err(KernelError::UnknownEntity(g)) if g == ghost));
    }

    fn crowd(ids: &[EntityId]) -> World {
        let mut w = World::default();
        let instance = w.create_instance();
        w.space(instance)
            .unwrap()
            .load_area(ChunkPos::new(-8, -8), ChunkPos::new(8, 8));
        for (i, id) in ids.iter().enumerate() {
            let x = i as f64 * 9.0 - 100.0;
            w.spawn_creature_with_id(
                *id,
                "zombie",
                DVec3::new(x, 0.0, 0.5),
                Some(instance),
                PathingEntity::default(),
            )
            .unwrap();
            let behavior = w.creature_mut(*id).unwrap().behavior_mut();
            behavior.add_goal(FollowTargetGoal::new(0, 1.5, 2.0));
            behavior.add_goal(RandomStrollGoal::new(1, 6, 0.2, i as u64));
            behavior.add_target_selector(ClosestEntityTarget::new(12.0));
        }
        w
    }

    #[test]
    fn parallel_step_matches_sequential() {
        let ids: Vec<EntityId> = (0..24).map(|_| EntityId::new()).collect();
        let mut sequential = crowd(&ids);
        let mut parallel = crowd(&ids);
        sequential.drain_events();
        parallel.drain_events();

        for _ in 0..40 {
            sequential.step();
            parallel.step_parallel();
        }
        assert_eq!(sequential.state_hash(), parallel.state_hash());
        assert_eq!(sequential.events(), parallel.events());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut w = World::default();
        let id = EntityId::new();
        w.spawn_with_id(id, "arrow", DVec3::ZERO, None).unwrap();
        let err = w.spawn_with_id(id, "arrow", DVec3::ZERO, None).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateEntity(d) if d == id));
    }

    #[test]
    fn placing_walls_through_the_world() {
        let (mut w, instance) = world_with_ground();
        w.rules_mut().register(WallPlacementRule::new("cobblestone_wall"));
        let wall = BlockState::new("cobblestone_wall", true);
        w.place_block(instance, BlockPos::new(0, 0, 0), wall.clone(), BlockFace::Top, None)
            .unwrap();
        let state = w
            .place_block(instance, BlockPos::new(1, 0, 0), wall, BlockFace::Top, None)
            .unwrap();
        assert_eq!(state.property("west"), Some("low"));

        let space = w.space(instance).unwrap();
        let neighbor = space.block(BlockPos::new(0, 0, 0)).unwrap();
        assert_eq!(neighbor.property("east"), Some("low"));
        assert!(matches!(w.events().last(), Some(WorldEvent::BlockPlaced { .. })));
    }

    #[test]
    fn summary_counts() {
        let (mut w, instance) = world_with_ground();
        zombie(&mut w, instance, DVec3::ZERO);
        let dying = zombie(&mut w, instance, DVec3::ONE);
        w.spawn("arrow", DVec3::ZERO, Some(instance)).unwrap();
        w.kill(dying).unwrap();
        let summary = w.summary();
        assert_eq!(summary.entity_count, 3);
        assert_eq!(summary.creatures, 2);
        assert_eq!(summary.dying, 1);
        assert!(summary.to_string().contains("entities=3"));
    }
}
