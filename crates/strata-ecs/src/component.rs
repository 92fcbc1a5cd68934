use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use uuid::Uuid;

/// Identity of a component kind.
///
/// Two ids are equal only if they came from the same [`ComponentId::new`]
/// call; the name is carried for debugging and never compared.
#[derive(Clone, Copy)]
pub struct ComponentId {
    token: Uuid,
    name: &'static str,
}

impl ComponentId {
    /// Mint a fresh, globally unique component id.
    pub fn new(name: &'static str) -> Self {
        Self {
            token: Uuid::new_v4(),
            name,
        }
    }

    /// Human-readable label given at creation.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The unique token backing this id.
    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token.cmp(&other.token)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({}#{})", self.name, &self.token.simple().to_string()[..8])
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A fragment of entity-local data.
///
/// Implementors report the [`ComponentId`] they are stored under; an entity
/// holds at most one instance per id.
pub trait Component: Any + Send + Sync {
    fn component_id(&self) -> ComponentId;
}

/// Shared handle to a component instance attached to an entity.
///
/// Clones refer to the same instance. Typed access goes through
/// [`read`](Self::read) and [`write`](Self::write), which return `None` if
/// the instance is not a `C`.
#[derive(Clone)]
pub struct ComponentRef {
    id: ComponentId,
    data: Arc<RwLock<dyn Any + Send + Sync>>,
}

impl ComponentRef {
    pub fn new<C: Component>(component: C) -> Self {
        Self {
            id: component.component_id(),
            data: Arc::new(RwLock::new(component)),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Whether the instance is of concrete type `C`.
    pub fn is<C: Component>(&self) -> bool {
        self.data.read().is::<C>()
    }

    /// Borrow the instance as `C`.
    pub fn read<C: Component>(&self) -> Option<MappedRwLockReadGuard<'_, C>> {
        RwLockReadGuard::try_map(self.data.read(), |data| data.downcast_ref::<C>()).ok()
    }

    /// Mutably borrow the instance as `C`.
    pub fn write<C: Component>(&self) -> Option<MappedRwLockWriteGuard<'_, C>> {
        RwLockWriteGuard::try_map(self.data.write(), |data| data.downcast_mut::<C>()).ok()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Health(u32);

    struct Tagged {
        id: ComponentId,
    }

    impl Component for Tagged {
        fn component_id(&self) -> ComponentId {
            self.id
        }
    }

    impl Component for Health {
        fn component_id(&self) -> ComponentId {
            *HEALTH
        }
    }

    static HEALTH: std::sync::LazyLock<ComponentId> =
        std::sync::LazyLock::new(|| ComponentId::new("Health"));

    #[test]
    fn ids_with_same_name_are_distinct() {
        let a = ComponentId::new("Position");
        let b = ComponentId::new("Position");
        assert_ne!(a, b);
        assert_eq!(a, a);
        assert_eq!(a.name(), b.name());

        let set: HashSet<_> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn typed_read_and_write() {
        let health = ComponentRef::new(Health(10));
        assert_eq!(health.id(), *HEALTH);
        assert!(health.is::<Health>());

        health.write::<Health>().unwrap().0 -= 3;
        assert_eq!(health.read::<Health>().unwrap().0, 7);
        assert!(health.read::<Tagged>().is_none());
    }

    #[test]
    fn clones_share_the_instance() {
        let id = ComponentId::new("Tag");
        let a = ComponentRef::new(Tagged { id });
        let b = a.clone();
        let c = ComponentRef::new(Tagged { id });
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.id(), c.id());
    }
}
