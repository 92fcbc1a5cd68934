//! Systems driving the demo scene

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec2;
use strata_ecs::{
    ComponentId, Disposable, DisposeBag, Family, System, TickInfo, World, WorldRef,
};
use tracing::{debug, info, warn};

use super::components::{Position, RandomMovement, Resting};

/// How far past the stage edge an entity may drift before it wraps.
const WRAP_OFFSET: f32 = 92.0;

fn movers() -> [ComponentId; 2] {
    [Position::id(), RandomMovement::id()]
}

/// Wrap one axis around `[-WRAP_OFFSET, extent + WRAP_OFFSET]`.
fn wrap(value: f32, extent: f32) -> f32 {
    if value < -WRAP_OFFSET {
        extent + WRAP_OFFSET
    } else if value > extent + WRAP_OFFSET {
        -WRAP_OFFSET
    } else {
        value
    }
}

/// Moves every entity with a position and a random movement.
pub struct MovementSystem {
    world: WorldRef,
    stage: Vec2,
    family: Option<Family>,
}

impl MovementSystem {
    pub fn new(stage: Vec2) -> Self {
        Self {
            world: WorldRef::new(),
            stage,
            family: None,
        }
    }
}

impl System for MovementSystem {
    fn world_ref(&self) -> &WorldRef {
        &self.world
    }

    fn added_to_world(&mut self, world: &World) {
        self.world.attach(world);
        self.family = Some(world.family(&movers()));
    }

    fn removed_from_world(&mut self, _world: &World) {
        self.world.detach();
        self.family = None;
    }

    fn update(&mut self, tick: &TickInfo) {
        let Some(family) = &self.family else {
            return;
        };
        for entity in family.entities() {
            let Some(movement) =
                entity.with_component(RandomMovement::id(), |m: &RandomMovement| *m)
            else {
                continue;
            };
            let stage = self.stage;
            entity.with_component_mut(Position::id(), |p: &mut Position| {
                let moved = p.0 + movement.direction * movement.speed * tick.delta_time;
                p.0 = Vec2::new(wrap(moved.x, stage.x), wrap(moved.y, stage.y));
            });
        }
    }
}

/// Periodically stops one mover for a while, then sets it moving again.
///
/// Stopping swaps `RandomMovement` for `Resting`, so the entity leaves the
/// movers family and rejoins it when it wakes up.
pub struct RestSystem {
    world: WorldRef,
    every: u64,
    duration: u32,
    ticks: u64,
}

impl RestSystem {
    pub fn new(every: u64, duration: u32) -> Self {
        Self {
            world: WorldRef::new(),
            every,
            duration,
            ticks: 0,
        }
    }

    fn wake_up(world: &World) {
        for entity in world.get_entities(&[Resting::id()]) {
            let done = entity
                .with_component_mut(Resting::id(), |r: &mut Resting| {
                    r.ticks_left = r.ticks_left.saturating_sub(1);
                    (r.ticks_left == 0).then_some(r.movement)
                })
                .flatten();
            if let Some(movement) = done {
                entity.remove_component(Resting::id());
                entity.add_component(movement);
                debug!(entity = entity.id(), "mover woke up");
            }
        }
    }

    fn send_to_rest(&self, world: &World) {
        let Some(entity) = world.get_entities(&movers()).into_iter().next() else {
            return;
        };
        let Some(movement) =
            entity.with_component(RandomMovement::id(), |m: &RandomMovement| *m)
        else {
            return;
        };
        entity.remove_component(RandomMovement::id());
        entity.add_component(Resting {
            ticks_left: self.duration,
            movement,
        });
        debug!(entity = entity.id(), ticks = self.duration, "mover resting");
    }
}

impl System for RestSystem {
    fn world_ref(&self) -> &WorldRef {
        &self.world
    }

    fn update(&mut self, _tick: &TickInfo) {
        let world = match self.world() {
            Ok(world) => world,
            Err(e) => {
                warn!("rest system skipped: {e}");
                return;
            }
        };
        self.ticks += 1;
        Self::wake_up(&world);
        if self.every > 0 && self.ticks % self.every == 0 {
            self.send_to_rest(&world);
        }
    }
}

/// Counters shared between a [`ReportSystem`] and its observers.
#[derive(Debug, Default)]
pub struct MoverStats {
    pub joined: AtomicU64,
    pub left: AtomicU64,
}

/// One periodic summary logged by [`ReportSystem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoverReport {
    pub tick: u64,
    pub elapsed_ms: f64,
    pub last_time: f64,
    pub entities: usize,
    pub movers: usize,
    pub resting: usize,
    pub joined: u64,
    pub left: u64,
}

/// Tracks movers entering and leaving, and logs a summary periodically.
pub struct ReportSystem {
    world: WorldRef,
    every: u64,
    ticks: u64,
    stats: Arc<MoverStats>,
    subscriptions: DisposeBag,
}

impl ReportSystem {
    pub fn new(every: u64) -> Self {
        Self {
            world: WorldRef::new(),
            every,
            ticks: 0,
            stats: Arc::default(),
            subscriptions: DisposeBag::new(),
        }
    }

    pub fn stats(&self) -> Arc<MoverStats> {
        self.stats.clone()
    }

    fn report(&self, world: &World, tick: &TickInfo) -> MoverReport {
        MoverReport {
            tick: self.ticks,
            elapsed_ms: tick.elapsed_ms,
            last_time: tick.last_time,
            entities: world.entity_count(),
            movers: world.get_entities(&movers()).len(),
            resting: world.get_entities(&[Resting::id()]).len(),
            joined: self.stats.joined.load(Ordering::Relaxed),
            left: self.stats.left.load(Ordering::Relaxed),
        }
    }
}

impl System for ReportSystem {
    fn world_ref(&self) -> &WorldRef {
        &self.world
    }

    fn added_to_world(&mut self, world: &World) {
        self.world.attach(world);
        let stats = self.stats.clone();
        self.subscriptions
            .subscribe(&world.entity_added(&movers()), move |_| {
                stats.joined.fetch_add(1, Ordering::Relaxed);
            });
        let stats = self.stats.clone();
        self.subscriptions
            .subscribe(&world.entity_removed(&movers()), move |_| {
                stats.left.fetch_add(1, Ordering::Relaxed);
            });
    }

    fn removed_from_world(&mut self, _world: &World) {
        self.world.detach();
        self.subscriptions.dispose();
        self.subscriptions = DisposeBag::new();
    }

    fn update(&mut self, tick: &TickInfo) {
        self.ticks += 1;
        if self.every == 0 || self.ticks % self.every != 0 {
            return;
        }
        let Ok(world) = self.world() else {
            return;
        };
        let report = self.report(&world, tick);
        info!(
            tick = report.tick,
            elapsed_ms = report.elapsed_ms,
            last_time = report.last_time,
            entities = report.entities,
            movers = report.movers,
            resting = report.resting,
            joined = report.joined,
            left = report.left,
            "simulation report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_ecs::Entity;

    fn tick() -> TickInfo {
        TickInfo {
            elapsed_ms: 16.0,
            last_time: 16.0,
            delta_time: 1.0,
        }
    }

    fn mover(at: Vec2, direction: Vec2) -> Entity {
        let entity = Entity::new();
        entity.add_component(Position(at)).add_component(RandomMovement {
            speed: 2.0,
            direction,
        });
        entity
    }

    fn position(entity: &Entity) -> Vec2 {
        entity
            .with_component(Position::id(), |p: &Position| p.0)
            .unwrap()
    }

    #[test]
    fn wrap_keeps_values_inside_margin() {
        assert_eq!(wrap(10.0, 800.0), 10.0);
        assert_eq!(wrap(-93.0, 800.0), 892.0);
        assert_eq!(wrap(893.0, 800.0), -92.0);
    }

    #[test]
    fn movement_scales_with_delta() {
        let world = World::new();
        let entity = mover(Vec2::new(100.0, 100.0), Vec2::new(1.0, -0.5));
        let still = Entity::new();
        still.add_component(Position(Vec2::ZERO));
        world.add_entity(&entity).add_entity(&still);
        world.add_system(MovementSystem::new(Vec2::new(800.0, 600.0)));

        world.update(&TickInfo {
            delta_time: 2.0,
            ..tick()
        });
        assert_eq!(position(&entity), Vec2::new(104.0, 98.0));
        assert_eq!(position(&still), Vec2::ZERO);
    }

    #[test]
    fn movers_wrap_around_the_stage() {
        let world = World::new();
        let entity = mover(Vec2::new(891.0, 0.0), Vec2::X);
        world.add_entity(&entity);
        world.add_system(MovementSystem::new(Vec2::new(800.0, 600.0)));

        world.update(&tick());
        assert_eq!(position(&entity).x, -92.0);
    }

    #[test]
    fn resting_mover_leaves_and_rejoins_family() {
        let world = World::new();
        let entity = mover(Vec2::ZERO, Vec2::X);
        world.add_entity(&entity);
        world.add_system(RestSystem::new(3, 2));

        world.update(&tick());
        world.update(&tick());
        assert_eq!(world.get_entities(&movers()), vec![entity.clone()]);

        world.update(&tick());
        assert!(world.get_entities(&movers()).is_empty());
        assert_eq!(world.get_entities(&[Resting::id()]), vec![entity.clone()]);

        world.update(&tick());
        assert!(entity.has_component(Resting::id()));

        world.update(&tick());
        assert_eq!(world.get_entities(&movers()), vec![entity.clone()]);
        assert!(!entity.has_component(Resting::id()));
        let speed = entity.with_component(RandomMovement::id(), |m: &RandomMovement| m.speed);
        assert_eq!(speed, Some(2.0));
    }

    #[test]
    fn report_counts_family_changes_until_removed() {
        let world = World::new();
        let system = ReportSystem::new(0);
        let stats = system.stats();
        let handle = world.add_system(system);

        let entity = mover(Vec2::ZERO, Vec2::X);
        world.add_entity(&entity);
        entity.remove_component(RandomMovement::id());
        assert_eq!(stats.joined.load(Ordering::Relaxed), 1);
        assert_eq!(stats.left.load(Ordering::Relaxed), 1);

        world.remove_system(&handle);
        entity.add_component(RandomMovement::default());
        assert_eq!(stats.joined.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn report_separates_elapsed_and_timestamp() {
        let world = World::new();
        world.add_entity(&mover(Vec2::ZERO, Vec2::X));
        let at = TickInfo {
            last_time: 48.0,
            ..tick()
        };
        let report = ReportSystem::new(1).report(&world, &at);
        assert_eq!(report.elapsed_ms, 16.0);
        assert_eq!(report.last_time, 48.0);
        assert_eq!(report.entities, 1);
        assert_eq!(report.movers, 1);
        assert_eq!(report.resting, 0);
    }
}
