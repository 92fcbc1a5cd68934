use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use strata_core::TickInfo;
use tracing::warn;

use crate::error::EcsError;
use crate::world::{WeakWorld, World};

/// The world a system is attached to, if any.
///
/// Holds a non-owning reference; reading it while detached, or after the
/// world has been dropped, yields [`EcsError::NotAttached`].
#[derive(Default)]
pub struct WorldRef {
    world: RwLock<Option<WeakWorld>>,
}

impl WorldRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, world: &World) {
        *self.world.write() = Some(world.downgrade());
    }

    pub fn detach(&self) {
        *self.world.write() = None;
    }

    pub fn get(&self) -> Result<World, EcsError> {
        self.world
            .read()
            .as_ref()
            .and_then(WeakWorld::upgrade)
            .ok_or(EcsError::NotAttached)
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_ok()
    }
}

impl fmt::Debug for WorldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// A unit of per-tick behavior.
///
/// The default lifecycle hooks record and clear the attached world in
/// [`world_ref`](Self::world_ref); implementors that override them should
/// keep doing so if they rely on [`world`](Self::world).
pub trait System: Send + 'static {
    /// Storage for the attached world.
    fn world_ref(&self) -> &WorldRef;

    /// Called after the system is added to `world`.
    fn added_to_world(&mut self, world: &World) {
        self.world_ref().attach(world);
    }

    /// Called after the system is removed from `world`.
    fn removed_from_world(&mut self, _world: &World) {
        self.world_ref().detach();
    }

    /// Called once per world update, in registration order.
    fn update(&mut self, _tick: &TickInfo) {}

    /// The world this system is attached to.
    fn world(&self) -> Result<World, EcsError> {
        self.world_ref().get()
    }
}

/// A system built from a closure.
pub struct FnSystem<F> {
    world: WorldRef,
    run: F,
}

/// Wrap a closure as a [`System`]. It runs on every update with the
/// attached world and the tick.
pub fn from_fn<F>(run: F) -> FnSystem<F>
where
    F: FnMut(&World, &TickInfo) + Send + 'static,
{
    FnSystem {
        world: WorldRef::new(),
        run,
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&World, &TickInfo) + Send + 'static,
{
    fn world_ref(&self) -> &WorldRef {
        &self.world
    }

    fn update(&mut self, tick: &TickInfo) {
        match self.world.get() {
            Ok(world) => (self.run)(&world, tick),
            Err(e) => warn!("skipping closure system update: {e}"),
        }
    }
}

/// Shared handle to a system registered with a world.
///
/// Handles compare by identity: the same handle may be added more than once,
/// and removal matches every occurrence of it.
#[derive(Clone)]
pub struct SystemHandle {
    inner: Arc<Mutex<dyn System>>,
}

impl SystemHandle {
    pub fn new<S: System>(system: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(system)),
        }
    }

    /// Lock the system for direct access.
    ///
    /// Must not be called from inside the same system's own callbacks.
    pub fn lock(&self) -> MutexGuard<'_, dyn System> {
        self.inner.lock()
    }

    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, dyn System>> {
        self.inner.try_lock()
    }

    /// Whether both handles refer to the same system.
    pub fn ptr_eq(&self, other: &SystemHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity of the shared system, stable for the handle's lifetime.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemHandle({:p})", Arc::as_ptr(&self.inner) as *const ())
    }
}
