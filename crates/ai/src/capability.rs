use blockworld_common::EntityId;

use crate::controller::{BehaviorController, GoalSelector};
use crate::navigator::Navigator;

/// Entities that select goals and targets.
pub trait AiCapable {
    fn behavior(&self) -> &BehaviorController;

    fn behavior_mut(&mut self) -> &mut BehaviorController;

    fn current_goal(&self) -> Option<&dyn GoalSelector> {
        self.behavior().current_goal()
    }

    fn target(&self) -> Option<EntityId> {
        self.behavior().target()
    }
}

/// Entities that own a navigator.
pub trait Navigable {
    fn navigator(&self) -> &Navigator;

    fn navigator_mut(&mut self) -> &mut Navigator;
}
