use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::DVec3;
use tracing_subscriber::EnvFilter;

use blockworld_ai::goals::{DoNothingGoal, MeleeAttackGoal, RandomStrollGoal};
use blockworld_ai::targets::{ClosestEntityTarget, LastAttackerTarget};
use blockworld_ai::{AiCapable, PathingEntity};
use blockworld_common::{BlockFace, BlockPos, ChunkPos, EntityId};
use blockworld_kernel::{World, WorldConfig, WorldEvent};
use blockworld_rules::{AxisPlacementRule, WallPlacementRule};
use blockworld_space::{BlockQuery, BlockState};

#[derive(Parser)]
#[command(name = "blockworld-cli", about = "Run blockworld demo simulations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Dump the event log as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default configuration
    Info,
    /// Spawn creatures and a few players, then step the world
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "200")]
        ticks: u64,
        /// Number of creatures to spawn
        #[arg(short, long, default_value = "16")]
        creatures: usize,
        /// Seed for goal randomness
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Tick regions on the rayon pool
        #[arg(short, long)]
        parallel: bool,
        /// YAML world configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Place a line of walls capped by a log and print the resulting states
    Walls {
        /// Number of wall blocks
        #[arg(short, long, default_value = "4")]
        length: i32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("blockworld-cli v{}", env!("CARGO_PKG_VERSION"));
            let config = WorldConfig::default();
            println!(
                "defaults: tick={}ms removal_delay={}ms region={} chunks height={}..{}",
                config.tick_millis,
                config.removal_animation_delay_ms,
                config.region_size_chunks,
                config.min_y,
                config.min_y + config.height
            );
        }
        Commands::Simulate {
            ticks,
            creatures,
            seed,
            parallel,
            config,
        } => {
            let config = match config {
                Some(path) => WorldConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => WorldConfig::default(),
            };
            let world = simulate(config, ticks, creatures, seed, parallel)?;
            report(&world, cli.json)?;
        }
        Commands::Walls { length } => {
            let world = walls(length)?;
            report(&world, cli.json)?;
        }
    }

    Ok(())
}

fn simulate(
    config: WorldConfig,
    ticks: u64,
    creatures: usize,
    seed: u64,
    parallel: bool,
) -> anyhow::Result<World> {
    let mut world = World::new(config);
    let instance = world.create_instance();
    world
        .space(instance)?
        .load_area(ChunkPos::new(-6, -6), ChunkPos::new(6, 6));

    let players: Vec<EntityId> = [(-20.0, -20.0), (20.0, 20.0), (0.0, 30.0)]
        .into_iter()
        .map(|(x, z)| world.spawn("player", DVec3::new(x, 0.0, z), Some(instance)))
        .collect::<Result<_, _>>()?;

    for i in 0..creatures {
        let angle = i as f64 / creatures.max(1) as f64 * std::f64::consts::TAU;
        let position = DVec3::new(angle.cos() * 40.0, 0.0, angle.sin() * 40.0);
        let id = world.spawn_creature("zombie", position, Some(instance), PathingEntity::default())?;
        let behavior = world.creature_mut(id)?.behavior_mut();
        let goal_seed = seed.wrapping_add(i as u64);
        behavior.add_goal(MeleeAttackGoal::new(0, 1.5, 20, 2.0));
        behavior.add_goal(RandomStrollGoal::new(1, 8, 0.05, goal_seed));
        behavior.add_goal(DoNothingGoal::new(2, 0.02, 40, goal_seed.rotate_left(17)));
        behavior.add_target_selector(LastAttackerTarget::new(24.0));
        behavior.add_target_selector(ClosestEntityTarget::new(16.0).with_kinds(["player"]));
    }

    tracing::info!(ticks, creatures, parallel, "simulation started");
    for tick in 0..ticks {
        if tick == ticks / 2 {
            if let Some(&player) = players.first() {
                world.kill(player)?;
            }
        }
        if parallel {
            world.step_parallel();
        } else {
            world.step();
        }
    }
    tracing::info!(state_hash = %format!("{:#x}", world.state_hash()), "simulation finished");
    Ok(world)
}

fn walls(length: i32) -> anyhow::Result<World> {
    let mut world = World::default();
    world.rules_mut().register(WallPlacementRule::new("cobblestone_wall"));
    world.rules_mut().register(AxisPlacementRule::new("oak_log"));
    let instance = world.create_instance();
    let space = world.space(instance)?;
    space.load_area(ChunkPos::new(-1, -1), ChunkPos::new(1, 1));

    let wall = BlockState::new("cobblestone_wall", true);
    for x in 0..length.max(0) {
        world.place_block(instance, BlockPos::new(x, 0, 0), wall.clone(), BlockFace::Top, None)?;
    }
    world.place_block(
        instance,
        BlockPos::new(length.max(0), 0, 0),
        BlockState::new("oak_log", true),
        BlockFace::East,
        None,
    )?;
    world.place_block(
        instance,
        BlockPos::new(0, 0, -1),
        BlockState::new("stone", true),
        BlockFace::Top,
        None,
    )?;

    for x in 0..=length.max(0) {
        let pos = BlockPos::new(x, 0, 0);
        if let Some(state) = space.block(pos) {
            println!("{pos} {state}");
        }
    }
    Ok(world)
}

fn report(world: &World, json: bool) -> anyhow::Result<()> {
    if json {
        let events = serde_json::to_string_pretty(world.events())?;
        println!("{events}");
        return Ok(());
    }

    println!("{}", world.summary());
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in world.events() {
        *counts.entry(event_name(event)).or_default() += 1;
    }
    for (name, count) in counts {
        println!("  {name:<18} {count}");
    }
    for entity in world.entities().values() {
        if let Some(creature) = entity.creature() {
            let p = entity.position();
            println!(
                "  [{}] {} pos=({:.2}, {:.2}, {:.2}) goal={} target={}",
                entity.id(),
                entity.kind(),
                p.x,
                p.y,
                p.z,
                creature.current_goal().map_or("-", |g| g.name()),
                creature.target().map_or_else(|| "-".to_owned(), |t| t.to_string()),
            );
        }
    }
    Ok(())
}

fn event_name(event: &WorldEvent) -> &'static str {
    match event {
        WorldEvent::Spawned { .. } => "spawned",
        WorldEvent::InstanceChanged { .. } => "instance_changed",
        WorldEvent::Killed { .. } => "killed",
        WorldEvent::RemovalScheduled { .. } => "removal_scheduled",
        WorldEvent::Removed { .. } => "removed",
        WorldEvent::GoalChanged { .. } => "goal_changed",
        WorldEvent::TargetChanged { .. } => "target_changed",
        WorldEvent::PathFinished { .. } => "path_finished",
        WorldEvent::SwingMainHand { .. } => "swing_main_hand",
        WorldEvent::Attack { .. } => "attack",
        WorldEvent::AiFault { .. } => "ai_fault",
        WorldEvent::BlockPlaced { .. } => "block_placed",
        WorldEvent::Stepped { .. } => "stepped",
    }
}
