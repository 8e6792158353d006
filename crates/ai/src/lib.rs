//! Creature AI: goal and target selection, navigation, path providers.
//!
//! # Invariants
//! - At most one goal is current per controller; the previous goal is ended
//!   before the next one starts.
//! - The current goal, if any, is a member of the controller's goal sequence.
//! - A navigator never keeps a route across a path provider rebind.
//! - All state in this crate is owned by one entity and never shared between
//!   threads while ticking.

mod capability;
mod context;
mod controller;
pub mod goals;
mod navigator;
mod path;
pub mod targets;

pub use capability::{AiCapable, Navigable};
pub use context::{AiAction, AiContext, EntityQuery, EntityView};
pub use controller::{AiError, AiTickReport, BehaviorController, GoalSelector, GoalSwitch, TargetSelector};
pub use navigator::{NavigationOutcome, Navigator};
pub use path::{
    DirectPathFactory, DirectPathProvider, PathProvider, PathProviderFactory, PathStep, PathingEntity,
};
