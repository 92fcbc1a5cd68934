use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::component::{Component, ComponentId, ComponentRef};
use crate::signal::Signal;

/// Process-unique entity identifier.
pub type EntityId = u64;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(0);

/// Allocate a new entity ID. IDs are strictly increasing.
fn next_entity_id() -> EntityId {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

struct EntityInner {
    id: EntityId,
    components: RwLock<HashMap<ComponentId, ComponentRef>>,
    component_added: Signal<ComponentRef>,
    component_removed: Signal<ComponentRef>,
}

/// A container of components.
///
/// `Entity` is a shared handle: clones refer to the same entity and compare
/// equal by id. The entity owns its component instances; worlds and families
/// only hold further handles to it.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Create an entity with no components and a fresh id.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id: next_entity_id(),
                components: RwLock::new(HashMap::new()),
                component_added: Signal::new(),
                component_removed: Signal::new(),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    // ---- Component access ----

    /// Check whether a component with this id is attached.
    pub fn has_component(&self, id: ComponentId) -> bool {
        self.inner.components.read().contains_key(&id)
    }

    /// Get the component attached under `id`, if any.
    pub fn get_component(&self, id: ComponentId) -> Option<ComponentRef> {
        self.inner.components.read().get(&id).cloned()
    }

    /// Run `f` against the component under `id` if it is attached and is a `C`.
    pub fn with_component<C: Component, R>(
        &self,
        id: ComponentId,
        f: impl FnOnce(&C) -> R,
    ) -> Option<R> {
        let component = self.get_component(id)?;
        let guard = component.read::<C>()?;
        Some(f(&*guard))
    }

    /// Mutable variant of [`with_component`](Self::with_component).
    pub fn with_component_mut<C: Component, R>(
        &self,
        id: ComponentId,
        f: impl FnOnce(&mut C) -> R,
    ) -> Option<R> {
        let component = self.get_component(id)?;
        let mut guard = component.write::<C>()?;
        Some(f(&mut *guard))
    }

    /// Ids of every attached component, in no particular order.
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.inner.components.read().keys().copied().collect()
    }

    pub fn component_count(&self) -> usize {
        self.inner.components.read().len()
    }

    // ---- Component mutation ----

    /// Attach a component, replacing any existing one with the same id, then
    /// notify `component_added` observers.
    pub fn add_component<C: Component>(&self, component: C) -> &Self {
        self.add_component_ref(ComponentRef::new(component))
    }

    /// Attach an existing component handle. Same semantics as
    /// [`add_component`](Self::add_component).
    pub fn add_component_ref(&self, component: ComponentRef) -> &Self {
        self.inner
            .components
            .write()
            .insert(component.id(), component.clone());
        self.inner.component_added.emit(&component);
        self
    }

    /// Detach the component under `id` and notify `component_removed`
    /// observers. Does nothing if no such component is attached.
    pub fn remove_component(&self, id: ComponentId) -> &Self {
        let removed = self.inner.components.write().remove(&id);
        if let Some(component) = removed {
            self.inner.component_removed.emit(&component);
        }
        self
    }

    // ---- Notifications ----

    /// Emitted after a component is attached.
    pub fn component_added(&self) -> &Signal<ComponentRef> {
        &self.inner.component_added
    }

    /// Emitted after a component is detached.
    pub fn component_removed(&self) -> &Signal<ComponentRef> {
        &self.inner.component_removed
    }

    /// Non-owning handle to this entity.
    pub fn downgrade(&self) -> WeakEntity {
        WeakEntity {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.inner.id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.id)
    }
}

/// Non-owning entity handle, used where holding an [`Entity`] would form a
/// reference cycle.
#[derive(Clone)]
pub struct WeakEntity {
    id: EntityId,
    inner: Weak<EntityInner>,
}

impl WeakEntity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity, if it is still alive.
    pub fn upgrade(&self) -> Option<Entity> {
        self.inner.upgrade().map(|inner| Entity { inner })
    }
}

impl fmt::Debug for WeakEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakEntity({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::LazyLock;

    static POSITION: LazyLock<ComponentId> = LazyLock::new(|| ComponentId::new("Position"));
    static VELOCITY: LazyLock<ComponentId> = LazyLock::new(|| ComponentId::new("Velocity"));

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        fn component_id(&self) -> ComponentId {
            *POSITION
        }
    }

    struct Velocity;

    impl Component for Velocity {
        fn component_id(&self) -> ComponentId {
            *VELOCITY
        }
    }

    fn record(signal: &Signal<ComponentRef>) -> Arc<Mutex<Vec<ComponentId>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let _ = signal.subscribe(move |c: &ComponentRef| sink.lock().push(c.id()));
        log
    }

    #[test]
    fn ids_strictly_increase() {
        let entities: Vec<Entity> = (0..16).map(|_| Entity::new()).collect();
        for pair in entities.windows(2) {
            assert!(pair[0].id() < pair[1].id());
        }
    }

    #[test]
    fn add_get_remove_component() {
        let entity = Entity::new();
        assert!(!entity.has_component(*POSITION));
        assert!(entity.get_component(*POSITION).is_none());

        entity.add_component(Position { x: 1.0, y: 2.0 });
        assert!(entity.has_component(*POSITION));
        assert_eq!(
            entity.with_component(*POSITION, |p: &Position| p.clone()),
            Some(Position { x: 1.0, y: 2.0 })
        );

        entity.remove_component(*POSITION);
        assert!(!entity.has_component(*POSITION));
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn same_id_overwrites() {
        let entity = Entity::new();
        let first = ComponentRef::new(Position { x: 1.0, y: 0.0 });
        let second = ComponentRef::new(Position { x: 2.0, y: 0.0 });
        entity.add_component_ref(first.clone()).add_component_ref(second.clone());

        let attached = entity.get_component(*POSITION).unwrap();
        assert!(attached.ptr_eq(&second));
        assert!(!attached.ptr_eq(&first));
        assert_eq!(entity.component_count(), 1);
    }

    #[test]
    fn mutation_in_place() {
        let entity = Entity::new();
        entity.add_component(Position { x: 0.0, y: 0.0 });
        entity.with_component_mut(*POSITION, |p: &mut Position| p.x = 5.0);
        assert_eq!(entity.with_component(*POSITION, |p: &Position| p.x), Some(5.0));
        assert_eq!(entity.with_component(*POSITION, |_: &Velocity| ()), None);
    }

    #[test]
    fn notifications_fire_synchronously() {
        let entity = Entity::new();
        let added = record(entity.component_added());
        let removed = record(entity.component_removed());

        entity.add_component(Position { x: 0.0, y: 0.0 });
        assert_eq!(*added.lock(), vec![*POSITION]);

        entity.add_component(Velocity);
        entity.remove_component(*POSITION);
        assert_eq!(*added.lock(), vec![*POSITION, *VELOCITY]);
        assert_eq!(*removed.lock(), vec![*POSITION]);
    }

    #[test]
    fn removing_absent_component_is_silent() {
        let entity = Entity::new();
        let removed = record(entity.component_removed());
        entity.remove_component(*VELOCITY);
        assert!(removed.lock().is_empty());
    }

    #[test]
    fn observers_can_read_the_entity() {
        let entity = Entity::new();
        let weak = entity.downgrade();
        let seen = Arc::new(Mutex::new(false));
        let flag = seen.clone();
        let _sub = entity.component_added().subscribe(move |_| {
            let entity = weak.upgrade().unwrap();
            *flag.lock() = entity.has_component(*POSITION);
        });

        entity.add_component(Position { x: 0.0, y: 0.0 });
        assert!(*seen.lock());
    }

    #[test]
    fn clones_are_the_same_entity() {
        let a = Entity::new();
        let b = a.clone();
        b.add_component(Velocity);
        assert_eq!(a, b);
        assert!(a.has_component(*VELOCITY));
        assert_ne!(a, Entity::new());
        assert_eq!(a.downgrade().id(), a.id());
    }
}
