use std::fmt;

use blockworld_common::EntityId;

use crate::context::{AiAction, AiContext, EntityQuery, EntityView};
use crate::navigator::Navigator;

/// A prioritized, activatable unit of autonomous behavior.
///
/// The controller calls `should_start` on idle goals and `should_continue` on
/// the running one, `start` once on activation, `tick` every tick while
/// current, and `end` once when it is replaced or no longer eligible.
pub trait GoalSelector: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Lower runs first. Ties keep insertion order.
    fn priority(&self) -> u32 {
        0
    }

    fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool;

    fn should_continue(&mut self, ctx: &mut AiContext<'_>) -> bool {
        self.should_start(ctx)
    }

    fn start(&mut self, _ctx: &mut AiContext<'_>) {}

    fn tick(&mut self, ctx: &mut AiContext<'_>);

    fn end(&mut self, _ctx: &mut AiContext<'_>) {}
}

/// Nominates a target entity. Never moves the entity itself.
pub trait TargetSelector: Send + fmt::Debug {
    fn find_target(&mut self, ctx: &AiContext<'_>) -> Option<EntityId>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AiError {
    #[error("current goal index {index} is outside the goal sequence (len {len})")]
    StaleCurrentGoal { index: usize, len: usize },
}

/// A change of current goal, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSwitch {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// What one controller tick produced.
#[derive(Debug, Default)]
pub struct AiTickReport {
    pub actions: Vec<AiAction>,
    pub goal_switch: Option<GoalSwitch>,
    /// `Some(new_target)` when the target changed this tick.
    pub target_change: Option<Option<EntityId>>,
}

/// Goal and target selection for one entity.
///
/// The current goal is held as an index into the goal sequence and is
/// validated against it on every tick.
#[derive(Debug, Default)]
pub struct BehaviorController {
    goals: Vec<Box<dyn GoalSelector>>,
    targets: Vec<Box<dyn TargetSelector>>,
    current: Option<usize>,
    target: Option<EntityId>,
}

impl BehaviorController {
    /// Controller with no goals, selectors or target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `goal` after every goal of equal or higher priority.
    pub fn add_goal(&mut self, goal: impl GoalSelector + 'static) {
        let priority = goal.priority();
        let at = self
            .goals
            .iter()
            .position(|g| g.priority() > priority)
            .unwrap_or(self.goals.len());
        if let Some(current) = self.current.as_mut() {
            if *current >= at {
                *current += 1;
            }
        }
        self.goals.insert(at, Box::new(goal));
    }

    /// Append a target selector. Selectors are polled in insertion order.
    pub fn add_target_selector(&mut self, selector: impl TargetSelector + 'static) {
        self.targets.push(Box::new(selector));
    }

    /// Goals in priority order.
    pub fn goals(&self) -> &[Box<dyn GoalSelector>] {
        &self.goals
    }

    /// Direct access to the goal sequence. Removing the current goal through
    /// this leaves a stale index that the next tick reports as an error.
    pub fn goals_mut(&mut self) -> &mut Vec<Box<dyn GoalSelector>> {
        &mut self.goals
    }

    /// Target selectors in polling order.
    pub fn target_selectors(&self) -> &[Box<dyn TargetSelector>] {
        &self.targets
    }

    /// Index of the running goal, if any.
    pub fn current_goal_index(&self) -> Option<usize> {
        self.current
    }

    /// The running goal, if any.
    pub fn current_goal(&self) -> Option<&dyn GoalSelector> {
        self.current
            .and_then(|i| self.goals.get(i))
            .map(|g| g.as_ref())
    }

    /// Current target entity.
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Set the target by hand. Selectors may replace it on the next tick.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    /// Clear the target if it is `removed`. Returns whether it was.
    pub fn forget_target(&mut self, removed: EntityId) -> bool {
        if self.target == Some(removed) {
            self.target = None;
            true
        } else {
            false
        }
    }

    /// Drop the current goal without ending it. Used after a fault, when the
    /// goal's own code can no longer be trusted to run.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Run one tick of target refresh and goal selection, then tick the
    /// current goal.
    pub fn tick(
        &mut self,
        me: &EntityView,
        tick: u64,
        navigator: &mut Navigator,
        world: &dyn EntityQuery,
    ) -> Result<AiTickReport, AiError> {
        let Self {
            goals,
            targets,
            current,
            target,
        } = self;

        if let Some(index) = *current {
            if index >= goals.len() {
                return Err(AiError::StaleCurrentGoal {
                    index,
                    len: goals.len(),
                });
            }
        }

        let previous_target = *target;
        let mut actions = Vec::new();
        let mut ctx = AiContext::new(
            me.id,
            me.instance,
            me.position,
            tick,
            navigator,
            &mut *target,
            world,
            &mut actions,
        );

        if let Some(t) = *ctx.target {
            if !ctx.world.is_alive(t) {
                *ctx.target = None;
            }
        }
        if !targets.is_empty() {
            let found = targets.iter_mut().find_map(|s| s.find_target(&ctx));
            *ctx.target = found;
        }

        // First eligible goal in priority order wins. The running goal is
        // judged by `should_continue`, so it is not dropped just because it
        // would not start afresh.
        let previous = *current;
        let mut winner = None;
        for (index, goal) in goals.iter_mut().enumerate() {
            let eligible = if Some(index) == previous {
                goal.should_continue(&mut ctx)
            } else {
                goal.should_start(&mut ctx)
            };
            if eligible {
                winner = Some(index);
                break;
            }
        }

        let mut goal_switch = None;
        if winner != previous {
            if let Some(old) = previous {
                goals[old].end(&mut ctx);
            }
            *current = winner;
            if let Some(new) = winner {
                goals[new].start(&mut ctx);
            }
            let name = |i: usize| goals[i].name().to_owned();
            goal_switch = Some(GoalSwitch {
                from: previous.map(name),
                to: winner.map(name),
            });
            tracing::debug!(entity = %me.id, switch = ?goal_switch, "goal switched");
        }

        if let Some(index) = *current {
            goals[index].tick(&mut ctx);
        }

        let target_change = (*target != previous_target).then_some(*target);
        Ok(AiTickReport {
            actions,
            goal_switch,
            target_change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{PathProvider, PathStep};
    use blockworld_common::InstanceId;
    use glam::DVec3;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counters {
        starts: AtomicUsize,
        ticks: AtomicUsize,
        ends: AtomicUsize,
    }

    /// Goal eligible from `from_tick` until `until_tick` (exclusive).
    #[derive(Debug)]
    struct Window {
        name: &'static str,
        priority: u32,
        from_tick: u64,
        until_tick: u64,
        counters: Arc<Counters>,
    }

    impl Window {
        fn new(name: &'static str, priority: u32, from_tick: u64) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            (
                Self {
                    name,
                    priority,
                    from_tick,
                    until_tick: u64::MAX,
                    counters: counters.clone(),
                },
                counters,
            )
        }
    }

    impl GoalSelector for Window {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool {
            (self.from_tick..self.until_tick).contains(&ctx.tick)
        }

        fn start(&mut self, _ctx: &mut AiContext<'_>) {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn tick(&mut self, _ctx: &mut AiContext<'_>) {
            self.counters.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn end(&mut self, _ctx: &mut AiContext<'_>) {
            self.counters.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn me() -> EntityView {
        EntityView {
            id: EntityId::new(),
            kind: "zombie".into(),
            position: DVec3::ZERO,
            instance: Some(InstanceId::new()),
            alive: true,
            last_attacker: None,
        }
    }

    fn run(controller: &mut BehaviorController, me: &EntityView, tick: u64) -> AiTickReport {
        let world: BTreeMap<EntityId, EntityView> = BTreeMap::from([(me.id, me.clone())]);
        let mut nav = Navigator::default();
        controller.tick(me, tick, &mut nav, &world).unwrap()
    }

    #[test]
    fn empty_goal_sequence_never_has_a_current_goal() {
        let mut controller = BehaviorController::new();
        let me = me();
        for tick in 0..100 {
            run(&mut controller, &me, tick);
            assert!(controller.current_goal().is_none());
        }
    }

    #[test]
    fn higher_priority_goal_preempts_once_eligible() {
        let mut controller = BehaviorController::new();
        let (a, a_counts) = Window::new("a", 0, 5);
        let (b, b_counts) = Window::new("b", 1, 0);
        controller.add_goal(b);
        controller.add_goal(a);
        let me = me();

        for tick in 0..5 {
            run(&mut controller, &me, tick);
            assert_eq!(controller.current_goal().map(|g| g.name()), Some("b"));
        }
        let report = run(&mut controller, &me, 5);
        assert_eq!(controller.current_goal().map(|g| g.name()), Some("a"));
        assert_eq!(
            report.goal_switch,
            Some(GoalSwitch {
                from: Some("b".into()),
                to: Some("a".into()),
            })
        );
        for tick in 6..20 {
            run(&mut controller, &me, tick);
            assert_eq!(controller.current_goal().map(|g| g.name()), Some("a"));
        }

        assert_eq!(b_counts.starts.load(Ordering::SeqCst), 1);
        assert_eq!(b_counts.ends.load(Ordering::SeqCst), 1);
        assert_eq!(b_counts.ticks.load(Ordering::SeqCst), 5);
        assert_eq!(a_counts.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a_counts.ends.load(Ordering::SeqCst), 0);
        assert_eq!(a_counts.ticks.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn lower_priority_goal_does_not_preempt() {
        let mut controller = BehaviorController::new();
        let (a, _) = Window::new("a", 0, 0);
        let (b, b_counts) = Window::new("b", 1, 0);
        controller.add_goal(a);
        controller.add_goal(b);
        let me = me();
        for tick in 0..10 {
            run(&mut controller, &me, tick);
        }
        assert_eq!(controller.current_goal().map(|g| g.name()), Some("a"));
        assert_eq!(b_counts.starts.load(Ordering::SeqCst), 0);
    }

    /// Starts only on tick 0 but keeps running for `runs` ticks.
    #[derive(Debug)]
    struct Burst {
        remaining: u32,
        runs: u32,
    }

    impl GoalSelector for Burst {
        fn name(&self) -> &str {
            "burst"
        }

        fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool {
            ctx.tick == 0
        }

        fn should_continue(&mut self, _ctx: &mut AiContext<'_>) -> bool {
            self.remaining > 0
        }

        fn start(&mut self, _ctx: &mut AiContext<'_>) {
            self.remaining = self.runs;
        }

        fn tick(&mut self, _ctx: &mut AiContext<'_>) {
            self.remaining -= 1;
        }
    }

    #[test]
    fn running_goal_is_sticky_while_it_should_continue() {
        let mut controller = BehaviorController::new();
        controller.add_goal(Burst {
            remaining: 0,
            runs: 3,
        });
        let me = me();
        for tick in 0..3 {
            run(&mut controller, &me, tick);
            assert_eq!(controller.current_goal().map(|g| g.name()), Some("burst"), "tick {tick}");
        }
        let report = run(&mut controller, &me, 3);
        assert!(controller.current_goal().is_none());
        assert_eq!(report.goal_switch.unwrap().to, None);
    }

    #[test]
    fn no_eligible_goal_ends_the_current_one() {
        let mut controller = BehaviorController::new();
        let (mut a, a_counts) = Window::new("a", 0, 0);
        a.until_tick = 2;
        controller.add_goal(a);
        let me = me();
        for tick in 0..4 {
            run(&mut controller, &me, tick);
        }
        assert!(controller.current_goal().is_none());
        assert_eq!(a_counts.ends.load(Ordering::SeqCst), 1);
        assert_eq!(a_counts.ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn add_goal_orders_by_priority() {
        let mut controller = BehaviorController::new();
        controller.add_goal(Window::new("late", 5, 0).0);
        controller.add_goal(Window::new("first", 0, 0).0);
        controller.add_goal(Window::new("middle", 2, 0).0);
        controller.add_goal(Window::new("middle2", 2, 0).0);
        let names: Vec<&str> = controller.goals().iter().map(|g| g.name()).collect();
        assert_eq!(names, ["first", "middle", "middle2", "late"]);
    }

    #[test]
    fn add_goal_keeps_current_index_pointing_at_same_goal() {
        let mut controller = BehaviorController::new();
        controller.add_goal(Window::new("b", 1, 0).0);
        let me = me();
        run(&mut controller, &me, 0);
        controller.add_goal(Window::new("a", 0, 100).0);
        assert_eq!(controller.current_goal().map(|g| g.name()), Some("b"));
    }

    #[test]
    fn stale_current_goal_is_reported() {
        let mut controller = BehaviorController::new();
        controller.add_goal(Window::new("a", 0, 0).0);
        let me = me();
        run(&mut controller, &me, 0);
        controller.goals_mut().clear();

        let world: BTreeMap<EntityId, EntityView> = BTreeMap::new();
        let mut nav = Navigator::default();
        let err = controller.tick(&me, 1, &mut nav, &world).unwrap_err();
        assert_eq!(err, AiError::StaleCurrentGoal { index: 0, len: 0 });
        controller.reset();
        assert!(controller.tick(&me, 2, &mut nav, &world).is_ok());
    }

    #[derive(Debug)]
    struct Fixed(Option<EntityId>);

    impl TargetSelector for Fixed {
        fn find_target(&mut self, _ctx: &AiContext<'_>) -> Option<EntityId> {
            self.0
        }
    }

    #[test]
    fn first_matching_target_selector_wins() {
        let me = me();
        let other = EntityId::new();
        let later = EntityId::new();
        let mut controller = BehaviorController::new();
        controller.add_target_selector(Fixed(None));
        controller.add_target_selector(Fixed(Some(other)));
        controller.add_target_selector(Fixed(Some(later)));
        let report = run(&mut controller, &me, 0);
        assert_eq!(controller.target(), Some(other));
        assert_eq!(report.target_change, Some(Some(other)));
    }

    #[test]
    fn no_matching_selector_clears_target() {
        let me = me();
        let mut controller = BehaviorController::new();
        controller.add_target_selector(Fixed(None));
        controller.set_target(Some(me.id));
        run(&mut controller, &me, 0);
        assert_eq!(controller.target(), None);
    }

    #[test]
    fn dead_target_is_cleared_without_selectors() {
        let me = me();
        let mut controller = BehaviorController::new();
        controller.set_target(Some(EntityId::new()));
        let report = run(&mut controller, &me, 0);
        assert_eq!(controller.target(), None);
        assert_eq!(report.target_change, Some(None));
    }

    #[test]
    fn manual_target_survives_without_selectors() {
        let me = me();
        let mut controller = BehaviorController::new();
        controller.set_target(Some(me.id));
        let report = run(&mut controller, &me, 0);
        assert_eq!(controller.target(), Some(me.id));
        assert_eq!(report.target_change, None);
    }

    #[derive(Debug)]
    struct Still(InstanceId);

    impl PathProvider for Still {
        fn instance(&self) -> InstanceId {
            self.0
        }

        fn advance(&mut self, _position: DVec3, _destination: DVec3, _speed: f64) -> PathStep {
            PathStep::Delta(DVec3::ZERO)
        }
    }

    #[derive(Debug)]
    struct GoTo(DVec3);

    impl GoalSelector for GoTo {
        fn name(&self) -> &str {
            "go_to"
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
    fn goal_started_this_tick_sets_route_before_navigation() {
        let me = me();
        let mut controller = BehaviorController::new();
        controller.add_goal(GoTo(DVec3::new(4.0, 0.0, 0.0)));
        let mut nav = Navigator::default();
        nav.set_path_provider(Box::new(Still(InstanceId::new())));
        let world: BTreeMap<EntityId, EntityView> = BTreeMap::new();
        controller.tick(&me, 0, &mut nav, &world).unwrap();
        assert_eq!(nav.destination(), Some(DVec3::new(4.0, 0.0, 0.0)));
    }
}
