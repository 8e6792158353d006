use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use blockworld_common::{BlockPos, InstanceId};
use blockworld_space::BlockQuery;

/// Distance under which a destination counts as reached.
const ARRIVAL_RADIUS: f64 = 0.05;

/// Physical description of the entity a path is computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathingEntity {
    pub width: f64,
    pub height: f64,
}

impl Default for PathingEntity {
    fn default() -> Self {
        Self {
            width: 0.6,
            height: 1.95,
        }
    }
}

/// Result of advancing a route by one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathStep {
    /// Move by this offset this tick.
    Delta(DVec3),
    /// The destination has been reached.
    Arrived,
    /// No progress toward the destination is possible.
    Unreachable,
}

/// Route-following strategy bound to one instance's block storage.
///
/// The search algorithm behind a provider is its own business; the navigator
/// only consumes one step per tick.
pub trait PathProvider: Send + fmt::Debug {
    /// The instance whose blocks this provider reads.
    fn instance(&self) -> InstanceId;

    /// Advance from `position` toward `destination` with a movement budget of
    /// `speed` blocks for this tick.
    fn advance(&mut self, position: DVec3, destination: DVec3, speed: f64) -> PathStep;

    /// Forget any route state; called whenever the destination changes.
    fn reset(&mut self) {}
}

/// Builds a path provider for an entity entering an instance.
pub trait PathProviderFactory: Send + Sync {
    fn create(
        &self,
        entity: PathingEntity,
        instance: InstanceId,
        space: Arc<dyn BlockQuery>,
    ) -> Box<dyn PathProvider>;
}

/// Straight-line provider: walks directly at the destination and reports
/// `Unreachable` as soon as a solid or unloaded block is in the way.
pub struct DirectPathProvider {
    instance: InstanceId,
    space: Arc<dyn BlockQuery>,
    entity: PathingEntity,
    max_stalled_steps: u32,
    stalled: u32,
}

impl fmt::Debug for DirectPathProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectPathProvider")
            .field("instance", &self.instance)
            .field("entity", &self.entity)
            .field("stalled", &self.stalled)
            .finish_non_exhaustive()
    }
}

impl DirectPathProvider {
    /// Provider for `entity` in `instance`. Gives up after `max_stalled_steps` blocked steps.
    pub fn new(
        entity: PathingEntity,
        instance: InstanceId,
        space: Arc<dyn BlockQuery>,
        max_stalled_steps: u32,
    ) -> Self {
        Self {
            instance,
            space,
            entity,
            max_stalled_steps,
            stalled: 0,
        }
    }

    /// Whether an entity standing at `position` would overlap a solid block
    /// or a block in an unloaded chunk.
    fn blocked_at(&self, position: DVec3) -> bool {
        let feet = BlockPos::containing(position);
        let head = BlockPos::containing(position + DVec3::new(0.0, self.entity.height, 0.0));
        (feet.y..=head.y).any(|y| {
            let pos = BlockPos::new(feet.x, y, feet.z);
            self.space.chunk(pos.chunk()).is_none() || self.space.is_solid(pos)
        })
    }
}

impl PathProvider for DirectPathProvider {
    fn instance(&self) -> InstanceId {
        self.instance
    }

    fn advance(&mut self, position: DVec3, destination: DVec3, speed: f64) -> PathStep {
        let to_go = destination - position;
        let distance = to_go.length();
        if distance <= ARRIVAL_RADIUS {
            self.stalled = 0;
            return PathStep::Arrived;
        }
        if speed <= 0.0 {
            self.stalled += 1;
            if self.stalled > self.max_stalled_steps {
                return PathStep::Unreachable;
            }
            return PathStep::Delta(DVec3::ZERO);
        }

        let step = to_go * (speed.min(distance) / distance);
        if self.blocked_at(position + step) {
            tracing::trace!(?position, ?destination, "direct path blocked");
            return PathStep::Unreachable;
        }
        self.stalled = 0;
        PathStep::Delta(step)
    }

    fn reset(&mut self) {
        self.stalled = 0;
    }
}

/// Factory for [`DirectPathProvider`].
#[derive(Debug, Clone, Copy)]
pub struct DirectPathFactory {
    pub max_stalled_steps: u32,
}

impl Default for DirectPathFactory {
    fn default() -> Self {
        Self {
            max_stalled_steps: 20,
        }
    }
}

impl PathProviderFactory for DirectPathFactory {
    fn create(
        &self,
        entity: PathingEntity,
        instance: InstanceId,
        space: Arc<dyn BlockQuery>,
    ) -> Box<dyn PathProvider> {
        Box::new(DirectPathProvider::new(
            entity,
            instance,
            space,
            self.max_stalled_steps,
        ))
    }
}
