use glam::DVec3;

use blockworld_common::InstanceId;

use crate::path::{PathProvider, PathStep, PathingEntity};

/// What a navigator tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationOutcome {
    /// No route; nothing happened.
    Idle,
    /// Move the entity by this offset now.
    Moved(DVec3),
    /// The destination was reached and the route cleared.
    Arrived,
    /// The provider gave up and the route was cleared.
    Unreachable,
}

impl NavigationOutcome {
    /// The offset to apply to the entity's position.
    pub fn delta(&self) -> DVec3 {
        match self {
            NavigationOutcome::Moved(d) => *d,
            _ => DVec3::ZERO,
        }
    }
}

/// Per-entity owner of the route and of the path provider binding.
///
/// The provider is rebound whenever the entity changes instance; a rebind
/// drops the current route so it is never followed in the wrong world.
#[derive(Debug, Default)]
pub struct Navigator {
    entity: PathingEntity,
    provider: Option<Box<dyn PathProvider>>,
    destination: Option<DVec3>,
}

impl Navigator {
    /// Navigator with no provider bound.
    pub fn new(entity: PathingEntity) -> Self {
        Self {
            entity,
            provider: None,
            destination: None,
        }
    }

    /// Physical descriptor handed to path provider factories.
    pub fn pathing_entity(&self) -> PathingEntity {
        self.entity
    }

    /// Bind a new provider, dropping any route computed by the previous one.
    pub fn set_path_provider(&mut self, provider: Box<dyn PathProvider>) {
        tracing::debug!(instance = ?provider.instance(), "path provider bound");
        self.provider = Some(provider);
        self.destination = None;
    }

    /// Unbind the provider (the entity left every instance).
    pub fn clear_path_provider(&mut self) {
        self.provider = None;
        self.destination = None;
    }

    /// Instance the current provider is bound to.
    pub fn instance(&self) -> Option<InstanceId> {
        self.provider.as_ref().map(|p| p.instance())
    }

    /// Start a new route toward `destination`. Fails without a provider.
    pub fn set_path_to(&mut self, destination: DVec3) -> bool {
        let Some(provider) = self.provider.as_mut() else {
            return false;
        };
        provider.reset();
        self.destination = Some(destination);
        true
    }

    /// Destination of the current route.
    pub fn destination(&self) -> Option<DVec3> {
        self.destination
    }

    /// Whether a route is in progress.
    pub fn has_route(&self) -> bool {
        self.destination.is_some()
    }

    /// Drop the current route.
    pub fn clear(&mut self) {
        if let Some(provider) = self.provider.as_mut() {
            provider.reset();
        }
        self.destination = None;
    }

    /// Advance the route by one step from `position` with `speed` blocks of
    /// movement budget. A no-op without a route.
    pub fn tick(&mut self, position: DVec3, speed: f64) -> NavigationOutcome {
        let (Some(provider), Some(destination)) = (self.provider.as_mut(), self.destination) else {
            return NavigationOutcome::Idle;
        };
        match provider.advance(position, destination, speed) {
            PathStep::Delta(delta) => NavigationOutcome::Moved(delta),
            PathStep::Arrived => {
                self.destination = None;
                NavigationOutcome::Arrived
            }
            PathStep::Unreachable => {
                tracing::trace!(?destination, "destination unreachable");
                self.destination = None;
                NavigationOutcome::Unreachable
            }
        }
    }
}
