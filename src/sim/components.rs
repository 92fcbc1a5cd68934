//! Components used by the demo scene

use std::sync::LazyLock;

use glam::Vec2;
use strata_ecs::{Component, ComponentId};

static POSITION: LazyLock<ComponentId> = LazyLock::new(|| ComponentId::new("Position"));
static RANDOM_MOVEMENT: LazyLock<ComponentId> =
    LazyLock::new(|| ComponentId::new("RandomMovement"));
static RESTING: LazyLock<ComponentId> = LazyLock::new(|| ComponentId::new("Resting"));

/// Where an entity sits on the stage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

impl Position {
    pub fn id() -> ComponentId {
        *POSITION
    }
}

impl Component for Position {
    fn component_id(&self) -> ComponentId {
        Self::id()
    }
}

/// Constant-speed wandering in a fixed direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomMovement {
    /// Units per frame at speed 1.0
    pub speed: f32,
    /// Per-axis direction, each component in [-1, 1]
    pub direction: Vec2,
}

impl RandomMovement {
    pub fn id() -> ComponentId {
        *RANDOM_MOVEMENT
    }
}

impl Default for RandomMovement {
    fn default() -> Self {
        Self {
            speed: 2.0,
            direction: Vec2::ONE,
        }
    }
}

impl Component for RandomMovement {
    fn component_id(&self) -> ComponentId {
        Self::id()
    }
}

/// A mover that has stopped for a while. Holds the movement to restore.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resting {
    pub ticks_left: u32,
    pub movement: RandomMovement,
}

impl Resting {
    pub fn id() -> ComponentId {
        *RESTING
    }
}

impl Component for Resting {
    fn component_id(&self) -> ComponentId {
        Self::id()
    }
}
