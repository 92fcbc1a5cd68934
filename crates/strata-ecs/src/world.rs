use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use strata_core::TickInfo;
use tracing::{debug, trace, warn};

use crate::component::{ComponentId, ComponentRef};
use crate::config::{FamilyKeyMode, WorldConfig};
use crate::entity::{Entity, EntityId};
use crate::entity_list::EntityList;
use crate::family::Family;
use crate::signal::{Disposable, DisposeBag, Signal};
use crate::system::{System, SystemHandle};

/// Cache key for a family, derived from the requested component ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FamilyKey(Vec<ComponentId>);

impl FamilyKey {
    /// Build the key for `ids`. Canonical keys are sorted and deduplicated;
    /// literal keys keep the ids as given.
    pub fn new(ids: &[ComponentId], mode: FamilyKeyMode) -> Self {
        let mut ids = ids.to_vec();
        if mode == FamilyKeyMode::Canonical {
            ids.sort_unstable();
            ids.dedup();
        }
        Self(ids)
    }

    /// The component ids a family under this key requires.
    pub fn components(&self) -> &[ComponentId] {
        &self.0
    }
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$-")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Families in creation order, indexed by key.
#[derive(Default)]
struct FamilyCache {
    by_key: HashMap<FamilyKey, Family>,
    order: Vec<Family>,
}

#[derive(Clone, Copy)]
enum Lifecycle {
    Added,
    Removed,
}

struct WorldInner {
    config: WorldConfig,
    systems: Mutex<Vec<SystemHandle>>,
    entities: Mutex<EntityList>,
    families: RwLock<FamilyCache>,
    subscriptions: Mutex<HashMap<EntityId, DisposeBag>>,
    /// Lifecycle calls for systems that were busy when the call was due.
    deferred: Mutex<Vec<(SystemHandle, Lifecycle)>>,
    /// Bumped whenever the schedule changes.
    schedule_version: AtomicU64,
}

impl Drop for WorldInner {
    fn drop(&mut self) {
        for bag in self.subscriptions.get_mut().values() {
            bag.dispose();
        }
    }
}

/// Owner of entities, systems and families.
///
/// `World` is a shared handle; clones refer to the same world. All calls are
/// synchronous, and notifications are delivered on the caller's stack, so
/// observers and systems may call back into the world freely.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            inner: Arc::new(WorldInner {
                config,
                systems: Mutex::new(Vec::new()),
                entities: Mutex::new(EntityList::new()),
                families: RwLock::new(FamilyCache::default()),
                subscriptions: Mutex::new(HashMap::new()),
                deferred: Mutex::new(Vec::new()),
                schedule_version: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.inner.config
    }

    /// Non-owning handle to this world.
    pub fn downgrade(&self) -> WeakWorld {
        WeakWorld {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same world.
    pub fn ptr_eq(&self, other: &World) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- System management ----

    /// Add a system to the end of the schedule and attach it.
    pub fn add_system<S: System>(&self, system: S) -> SystemHandle {
        let handle = SystemHandle::new(system);
        self.insert_system(handle.clone());
        handle
    }

    /// Add an existing handle to the end of the schedule and attach it.
    /// Adding the same handle twice schedules it twice.
    pub fn insert_system(&self, handle: SystemHandle) -> &Self {
        self.inner.systems.lock().push(handle.clone());
        self.inner.schedule_version.fetch_add(1, Ordering::Relaxed);
        debug!(system = ?handle, "system added");
        self.notify(&handle, Lifecycle::Added);
        self
    }

    /// Remove every occurrence of `handle`, detaching once per occurrence.
    pub fn remove_system(&self, handle: &SystemHandle) -> &Self {
        let removed = {
            let mut systems = self.inner.systems.lock();
            let before = systems.len();
            systems.retain(|system| !system.ptr_eq(handle));
            before - systems.len()
        };
        if removed > 0 {
            self.inner.schedule_version.fetch_add(1, Ordering::Relaxed);
        }
        for _ in 0..removed {
            debug!(system = ?handle, "system removed");
            self.notify(handle, Lifecycle::Removed);
        }
        self
    }

    /// Remove and detach every system.
    pub fn remove_all_systems(&self) -> &Self {
        let drained = std::mem::take(&mut *self.inner.systems.lock());
        self.inner.schedule_version.fetch_add(1, Ordering::Relaxed);
        for handle in &drained {
            self.notify(handle, Lifecycle::Removed);
        }
        debug!(count = drained.len(), "all systems removed");
        self
    }

    pub fn has_system(&self, handle: &SystemHandle) -> bool {
        self.inner
            .systems
            .lock()
            .iter()
            .any(|system| system.ptr_eq(handle))
    }

    pub fn system_count(&self) -> usize {
        self.inner.systems.lock().len()
    }

    fn notify(&self, handle: &SystemHandle, event: Lifecycle) {
        // A system inside its own update or hook is locked; queue the call
        // and run it once that lock is released.
        if self.run_hook(handle, event) {
            self.flush_deferred();
        } else {
            self.inner.deferred.lock().push((handle.clone(), event));
        }
    }

    /// Run a lifecycle hook unless the system is locked. The lock is released
    /// before returning.
    fn run_hook(&self, handle: &SystemHandle, event: Lifecycle) -> bool {
        let Some(mut system) = handle.try_lock() else {
            return false;
        };
        match event {
            Lifecycle::Added => system.added_to_world(self),
            Lifecycle::Removed => system.removed_from_world(self),
        }
        true
    }

    /// Run queued hooks whose systems are no longer locked, repeating until
    /// a pass makes no progress. Calls still blocked stay queued in order.
    fn flush_deferred(&self) {
        loop {
            let pending = std::mem::take(&mut *self.inner.deferred.lock());
            if pending.is_empty() {
                return;
            }
            let mut progressed = false;
            let mut blocked = Vec::new();
            for (handle, event) in pending {
                if self.run_hook(&handle, event) {
                    progressed = true;
                } else {
                    blocked.push((handle, event));
                }
            }
            {
                let mut deferred = self.inner.deferred.lock();
                blocked.append(&mut deferred);
                *deferred = blocked;
            }
            if !progressed {
                return;
            }
        }
    }

    // ---- Entity management ----

    /// Register an entity.
    ///
    /// The entity joins the roster, the world starts following its component
    /// changes, and every existing family is offered the entity. Adding an
    /// entity that is already registered does nothing.
    pub fn add_entity(&self, entity: &Entity) -> &Self {
        {
            let mut entities = self.inner.entities.lock();
            if entities.has(entity) {
                warn!(entity = entity.id(), "entity is already in this world");
                return self;
            }
            entities.add(entity.clone());
        }

        let bag = DisposeBag::new();
        let (world, weak) = (self.downgrade(), entity.downgrade());
        bag.subscribe(entity.component_added(), move |component| {
            if let (Some(world), Some(entity)) = (world.upgrade(), weak.upgrade()) {
                world.on_component_added(&entity, component);
            }
        });
        let (world, weak) = (self.downgrade(), entity.downgrade());
        bag.subscribe(entity.component_removed(), move |component| {
            if let (Some(world), Some(entity)) = (world.upgrade(), weak.upgrade()) {
                world.on_component_removed(&entity, component);
            }
        });
        self.inner.subscriptions.lock().insert(entity.id(), bag);
        trace!(entity = entity.id(), "entity added to world");

        for family in self.families_snapshot() {
            // An observer of an earlier family may have removed it again.
            if !self.has_entity(entity) {
                break;
            }
            family.add_entity_if_match(entity);
        }
        self
    }

    /// Unregister an entity, evicting it from every family and releasing its
    /// component subscriptions. Unknown entities are ignored.
    ///
    /// The entity keeps its components.
    pub fn remove_entity(&self, entity: &Entity) -> &Self {
        if !self.inner.entities.lock().remove(entity) {
            return self;
        }
        let bag = self.inner.subscriptions.lock().remove(&entity.id());
        if let Some(bag) = bag {
            bag.dispose();
        }
        trace!(entity = entity.id(), "entity removed from world");

        for family in self.families_snapshot() {
            // Re-added by an observer; that add already placed it in every family.
            if self.has_entity(entity) {
                break;
            }
            family.remove_entity(entity);
        }
        self
    }

    /// Remove every entity currently registered.
    pub fn remove_all_entities(&self) -> &Self {
        for entity in self.entities() {
            self.remove_entity(&entity);
        }
        self
    }

    pub fn has_entity(&self, entity: &Entity) -> bool {
        self.inner.entities.lock().has(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.entities.lock().len()
    }

    /// Every registered entity, in registration order.
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.entities.lock().to_vec()
    }

    // ---- Queries ----

    /// The family for `ids`, created and seeded with the current entities on
    /// first request.
    pub fn family(&self, ids: &[ComponentId]) -> Family {
        let key = FamilyKey::new(ids, self.inner.config.family_keys);
        if let Some(family) = self.inner.families.read().by_key.get(&key) {
            return family.clone();
        }

        let family = {
            let mut families = self.inner.families.write();
            if let Some(family) = families.by_key.get(&key) {
                return family.clone();
            }
            let family = Family::new(key.components());
            families.by_key.insert(key.clone(), family.clone());
            families.order.push(family.clone());
            family
        };

        let roster = self.entities();
        for entity in &roster {
            family.add_entity_if_match(entity);
        }
        debug!(family = %key, members = family.len(), "family created");
        family
    }

    /// Entities that have every component in `ids`.
    pub fn get_entities(&self, ids: &[ComponentId]) -> Vec<Entity> {
        self.family(ids).entities()
    }

    /// Emitted when an entity starts matching `ids`, either by being added
    /// or by gaining a component.
    pub fn entity_added(&self, ids: &[ComponentId]) -> Signal<Entity> {
        self.family(ids).entity_added().clone()
    }

    /// Emitted when an entity stops matching `ids`, either by being removed
    /// or by losing a component.
    pub fn entity_removed(&self, ids: &[ComponentId]) -> Signal<Entity> {
        self.family(ids).entity_removed().clone()
    }

    pub fn family_count(&self) -> usize {
        self.inner.families.read().order.len()
    }

    fn families_snapshot(&self) -> Vec<Family> {
        self.inner.families.read().order.clone()
    }

    fn on_component_added(&self, entity: &Entity, component: &ComponentRef) {
        for family in self.families_snapshot() {
            // Removed during this emission; its subscription is already released.
            if !self.has_entity(entity) {
                return;
            }
            family.on_component_added(entity, component);
        }
    }

    fn on_component_removed(&self, entity: &Entity, component: &ComponentRef) {
        for family in self.families_snapshot() {
            if !self.has_entity(entity) {
                return;
            }
            family.on_component_removed(entity, component);
        }
    }

    // ---- Tick ----

    /// Run every system's update in registration order.
    ///
    /// Systems removed during this tick are not run again.
    pub fn update(&self, tick: &TickInfo) {
        let systems = self.inner.systems.lock().clone();
        let mut seen_version = self.inner.schedule_version.load(Ordering::Relaxed);
        let mut live: Option<HashSet<usize>> = None;
        for handle in &systems {
            // Only rescan the schedule after it changed.
            let version = self.inner.schedule_version.load(Ordering::Relaxed);
            if version != seen_version {
                seen_version = version;
                live = Some(self.inner.systems.lock().iter().map(SystemHandle::key).collect());
            }
            if live.as_ref().is_some_and(|live| !live.contains(&handle.key())) {
                continue;
            }
            handle.lock().update(tick);
            self.flush_deferred();
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("systems", &self.system_count())
            .field("families", &self.family_count())
            .finish()
    }
}

/// Non-owning world handle.
#[derive(Clone)]
pub struct WeakWorld {
    inner: Weak<WorldInner>,
}

impl WeakWorld {
    pub fn upgrade(&self) -> Option<World> {
        self.inner.upgrade().map(|inner| World { inner })
    }
}

impl fmt::Debug for WeakWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakWorld")
    }
}
