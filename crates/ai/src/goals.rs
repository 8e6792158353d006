//! Built-in goal selectors.

use glam::DVec3;

use crate::context::AiContext;
use crate::controller::GoalSelector;

/// Deterministic random source for goals (splitmix64), so a seeded world
/// replays the same wandering.
#[derive(Debug, Clone)]
pub struct GoalRng(u64);

impl GoalRng {
    /// Seeded generator; equal seeds give equal sequences.
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value of the splitmix64 sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[-radius, radius]`.
    pub fn offset(&mut self, radius: i32) -> i32 {
        let radius = i64::from(radius.max(0));
        let span = (2 * radius + 1) as u64;
        ((self.next_u64() % span) as i64 - radius) as i32
    }
}

/// Stand still for a while. Starts with probability `chance` per tick.
#[derive(Debug)]
pub struct DoNothingGoal {
    priority: u32,
    chance: f64,
    duration_ticks: u64,
    remaining: u64,
    rng: GoalRng,
}

impl DoNothingGoal {
    /// Idle for `duration_ticks` with probability `chance` per eligible tick.
    pub fn new(priority: u32, chance: f64, duration_ticks: u64, seed: u64) -> Self {
        Self {
            priority,
            chance,
            duration_ticks,
            remaining: 0,
            rng: GoalRng::new(seed),
        }
    }
}

impl GoalSelector for DoNothingGoal {
    fn name(&self) -> &str {
        "do_nothing"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn should_start(&mut self, _ctx: &mut AiContext<'_>) -> bool {
        self.rng.next_f64() < self.chance
    }

    fn should_continue(&mut self, _ctx: &mut AiContext<'_>) -> bool {
        self.remaining > 0
    }

    fn start(&mut self, ctx: &mut AiContext<'_>) {
        self.remaining = self.duration_ticks;
        ctx.navigator.clear();
    }

    fn tick(&mut self, _ctx: &mut AiContext<'_>) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Walk to a random spot within `radius` blocks, then pick another.
#[derive(Debug)]
pub struct RandomStrollGoal {
    priority: u32,
    radius: i32,
    chance: f64,
    rng: GoalRng,
}

impl RandomStrollGoal {
    /// Wander to a random spot within `radius` blocks with probability `chance` per tick.
    pub fn new(priority: u32, radius: i32, chance: f64, seed: u64) -> Self {
        Self {
            priority,
            radius,
            chance,
            rng: GoalRng::new(seed),
        }
    }
}

impl GoalSelector for RandomStrollGoal {
    fn name(&self) -> &str {
        "random_stroll"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool {
        ctx.navigator.instance().is_some() && self.rng.next_f64() < self.chance
    }

    fn should_continue(&mut self, ctx: &mut AiContext<'_>) -> bool {
        ctx.navigator.has_route()
    }

    fn start(&mut self, ctx: &mut AiContext<'_>) {
        let dx = self.rng.offset(self.radius);
        let dz = self.rng.offset(self.radius);
        let destination = ctx.position + DVec3::new(dx as f64, 0.0, dz as f64);
        ctx.navigator.set_path_to(destination);
    }

    fn tick(&mut self, _ctx: &mut AiContext<'_>) {}

    fn end(&mut self, ctx: &mut AiContext<'_>) {
        ctx.navigator.clear();
    }
}

/// Walk toward the current target, re-pathing when it moves away from the
/// spot the route was computed for.
#[derive(Debug)]
pub struct FollowTargetGoal {
    priority: u32,
    stop_distance: f64,
    repath_distance: f64,
    routed_to: Option<DVec3>,
}

impl FollowTargetGoal {
    /// Chase the target until within `stop_distance`, re-routing once it moves `repath_distance`.
    pub fn new(priority: u32, stop_distance: f64, repath_distance: f64) -> Self {
        Self {
            priority,
            stop_distance,
            repath_distance,
            routed_to: None,
        }
    }

    fn follow(&mut self, ctx: &mut AiContext<'_>) {
        let Some(target) = ctx.target_view() else {
            return;
        };
        if target.position.distance(ctx.position) <= self.stop_distance {
            ctx.navigator.clear();
            self.routed_to = None;
            return;
        }
        let stale = match self.routed_to {
            Some(spot) => spot.distance(target.position) > self.repath_distance,
            None => true,
        };
        if (stale || !ctx.navigator.has_route()) && ctx.navigator.set_path_to(target.position) {
            self.routed_to = Some(target.position);
        }
    }
}

impl GoalSelector for FollowTargetGoal {
    fn name(&self) -> &str {
        "follow_target"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool {
        ctx.target_view()
            .is_some_and(|t| t.position.distance(ctx.position) > self.stop_distance)
    }

    fn should_continue(&mut self, ctx: &mut AiContext<'_>) -> bool {
        ctx.target_view().is_some()
    }

    fn start(&mut self, ctx: &mut AiContext<'_>) {
        self.routed_to = None;
        self.follow(ctx);
    }

    fn tick(&mut self, ctx: &mut AiContext<'_>) {
        self.follow(ctx);
    }

    fn end(&mut self, ctx: &mut AiContext<'_>) {
        self.routed_to = None;
        ctx.navigator.clear();
    }
}

/// Chase the target and hit it whenever it is within `range`, at most once
/// every `cooldown_ticks`.
#[derive(Debug)]
pub struct MeleeAttackGoal {
    priority: u32,
    range: f64,
    cooldown_ticks: u64,
    last_attack: Option<u64>,
    chase: FollowTargetGoal,
}

impl MeleeAttackGoal {
    /// Attack the target within `range` at most once per `cooldown_ticks`, chasing it otherwise.
    pub fn new(priority: u32, range: f64, cooldown_ticks: u64, repath_distance: f64) -> Self {
        Self {
            priority,
            range,
            cooldown_ticks,
            last_attack: None,
            chase: FollowTargetGoal::new(priority, range, repath_distance),
        }
    }

    fn cooled_down(&self, tick: u64) -> bool {
        self.last_attack
            .is_none_or(|last| tick.saturating_sub(last) >= self.cooldown_ticks)
    }
}

impl GoalSelector for MeleeAttackGoal {
    fn name(&self) -> &str {
        "melee_attack"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn should_start(&mut self, ctx: &mut AiContext<'_>) -> bool {
        ctx.target_view().is_some()
    }

    fn start(&mut self, ctx: &mut AiContext<'_>) {
        self.chase.start(ctx);
    }

    fn tick(&mut self, ctx: &mut AiContext<'_>) {
        let Some(target) = ctx.target_view() else {
            return;
        };
        if target.position.distance(ctx.position) <= self.range {
            ctx.navigator.clear();
            if self.cooled_down(ctx.tick) {
                ctx.attack(target.id, true);
                self.last_attack = Some(ctx.tick);
            }
        } else {
            self.chase.tick(ctx);
        }
    }

    fn end(&mut self, ctx: &mut AiContext<'_>) {
        self.chase.end(ctx);
    }
}
