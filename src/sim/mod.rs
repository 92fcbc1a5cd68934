//! Demo scene: wandering movers and static bodies on a wrapping stage

pub mod components;
pub mod systems;

use std::sync::atomic::Ordering;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_core::Ticker;
use strata_ecs::{Entity, World};
use tracing::{debug, info};

use crate::settings::{ScenarioSettings, SimulationSettings};
use components::{Position, RandomMovement, Resting};
use systems::{MovementSystem, ReportSystem, RestSystem};

/// Counts taken at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub entities: usize,
    pub movers: usize,
    pub resting: usize,
    pub families: usize,
}

/// Spawn the scene's entities into `world`.
pub fn populate(world: &World, scenario: &ScenarioSettings) {
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let stage = Vec2::new(scenario.stage_width, scenario.stage_height);
    let random_position =
        |rng: &mut StdRng| Position(Vec2::new(rng.gen::<f32>(), rng.gen::<f32>()) * stage);

    for _ in 0..scenario.movers {
        let entity = Entity::new();
        entity
            .add_component(random_position(&mut rng))
            .add_component(RandomMovement {
                speed: rng.gen_range(0.5..3.0),
                direction: Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)),
            });
        world.add_entity(&entity);
    }

    for _ in 0..scenario.static_bodies {
        let entity = Entity::new();
        entity.add_component(random_position(&mut rng));
        world.add_entity(&entity);
    }

    debug!(
        movers = scenario.movers,
        static_bodies = scenario.static_bodies,
        "populated world"
    );
}

/// Build the world, run the configured number of ticks, then tear down.
pub fn run(settings: &SimulationSettings) -> RunSummary {
    let scenario = &settings.simulation;
    let world = World::with_config(settings.world.clone());
    let stage = Vec2::new(scenario.stage_width, scenario.stage_height);

    world.add_system(RestSystem::new(scenario.rest_every, scenario.rest_ticks));
    world.add_system(MovementSystem::new(stage));
    let report = ReportSystem::new(scenario.report_every);
    let stats = report.stats();
    world.add_system(report);
    populate(&world, scenario);

    let mut ticker = Ticker::new(settings.ticker.clone());
    let step = ticker.config.frame_ms();
    for _ in 0..scenario.ticks {
        let tick = ticker.advance(step);
        world.update(&tick);
    }

    let summary = RunSummary {
        ticks: ticker.frame_count(),
        entities: world.entity_count(),
        movers: world.get_entities(&[Position::id(), RandomMovement::id()]).len(),
        resting: world.get_entities(&[Resting::id()]).len(),
        families: world.family_count(),
    };
    info!(
        ?summary,
        joined = stats.joined.load(Ordering::Relaxed),
        left = stats.left.load(Ordering::Relaxed),
        "simulation finished"
    );

    world.remove_all_systems();
    world.remove_all_entities();
    summary
}
