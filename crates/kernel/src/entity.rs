use glam::DVec3;
use serde::{Deserialize, Serialize};

use blockworld_ai::{AiCapable, BehaviorController, EntityView, Navigable, Navigator, PathingEntity};
use blockworld_common::{ChunkPos, EntityId, InstanceId};

/// Where an entity is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Alive,
    /// Killed; removed from the world once the clock reaches `remove_at_ms`.
    Dying { remove_at_ms: u64 },
    Removed,
}

/// AI-driven part of an entity.
#[derive(Debug)]
pub struct Creature {
    behavior: BehaviorController,
    navigator: Navigator,
    removal_animation_delay_ms: u64,
}

impl Creature {
    /// Creature part with an empty controller and an unbound navigator.
    pub fn new(size: PathingEntity, removal_animation_delay_ms: u64) -> Self {
        Self {
            behavior: BehaviorController::new(),
            navigator: Navigator::new(size),
            removal_animation_delay_ms,
        }
    }

    /// Milliseconds between death and removal.
    pub fn removal_animation_delay(&self) -> u64 {
        self.removal_animation_delay_ms
    }

    /// Set the removal delay used by later kills.
    pub fn set_removal_animation_delay(&mut self, delay_ms: u64) {
        self.removal_animation_delay_ms = delay_ms;
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut BehaviorController, &mut Navigator) {
        (&mut self.behavior, &mut self.navigator)
    }
}

impl AiCapable for Creature {
    fn behavior(&self) -> &BehaviorController {
        &self.behavior
    }

    fn behavior_mut(&mut self) -> &mut BehaviorController {
        &mut self.behavior
    }
}

impl Navigable for Creature {
    fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }
}

/// An entity stored in the world. Plain entities have no creature part and
/// are only aged each tick.
#[derive(Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) kind: String,
    pub(crate) position: DVec3,
    pub(crate) instance: Option<InstanceId>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) movement_speed: f64,
    pub(crate) age_ticks: u64,
    pub(crate) last_attacker: Option<EntityId>,
    pub(crate) creature: Option<Creature>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, kind: String, position: DVec3, instance: Option<InstanceId>) -> Self {
        Self {
            id,
            kind,
            position,
            instance,
            lifecycle: Lifecycle::Alive,
            movement_speed: 0.0,
            age_ticks: 0,
            last_attacker: None,
            creature: None,
        }
    }

    /// Unique entity id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Kind name, e.g. `zombie`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Position in world coordinates.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Chunk containing the entity.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::of_position(self.position)
    }

    /// Instance the entity is in, if any.
    pub fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    /// Current lifecycle stage.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Alive and not dying.
    pub fn is_alive(&self) -> bool {
        self.lifecycle == Lifecycle::Alive
    }

    /// Blocks per tick the navigator may move this entity.
    pub fn movement_speed(&self) -> f64 {
        self.movement_speed
    }

    /// Set the movement speed. Negative values clamp to zero.
    pub fn set_movement_speed(&mut self, speed: f64) {
        self.movement_speed = speed.max(0.0);
    }

    /// Ticks this entity has been updated while alive.
    pub fn age(&self) -> u64 {
        self.age_ticks
    }

    /// Entity that last attacked this one.
    pub fn last_attacker(&self) -> Option<EntityId> {
        self.last_attacker
    }

    /// AI part, present only for creatures.
    pub fn creature(&self) -> Option<&Creature> {
        self.creature.as_ref()
    }

    /// Mutable AI part, present only for creatures.
    pub fn creature_mut(&mut self) -> Option<&mut Creature> {
        self.creature.as_mut()
    }

    /// Whether the entity has an AI part.
    pub fn is_creature(&self) -> bool {
        self.creature.is_some()
    }

    /// Snapshot handed to AI code.
    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.id,
            kind: self.kind.clone(),
            position: self.position,
            instance: self.instance,
            alive: self.is_alive(),
            last_attacker: self.last_attacker,
        }
    }

    /// Per-tick work shared by every entity kind.
    pub(crate) fn base_update(&mut self) {
        self.age_ticks += 1;
    }
}
