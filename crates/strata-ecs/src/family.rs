use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::component::{ComponentId, ComponentRef};
use crate::entity::Entity;
use crate::entity_list::EntityList;
use crate::signal::Signal;

struct FamilyInner {
    required: Vec<ComponentId>,
    members: Mutex<EntityList>,
    entity_added: Signal<Entity>,
    entity_removed: Signal<Entity>,
}

/// Cached set of the entities that carry every required component.
///
/// A family is kept up to date by its world: it is offered every entity that
/// joins or leaves and every component change, and decides membership on
/// its own. Clones share the same membership.
#[derive(Clone)]
pub struct Family {
    inner: Arc<FamilyInner>,
}

impl Family {
    /// Create an empty family requiring `required`. The ids are copied.
    pub fn new(required: &[ComponentId]) -> Self {
        Self {
            inner: Arc::new(FamilyInner {
                required: required.to_vec(),
                members: Mutex::new(EntityList::new()),
                entity_added: Signal::new(),
                entity_removed: Signal::new(),
            }),
        }
    }

    pub fn required_components(&self) -> &[ComponentId] {
        &self.inner.required
    }

    /// Current members, in the order they last qualified.
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.members.lock().to_vec()
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner.members.lock().has(entity)
    }

    pub fn len(&self) -> usize {
        self.inner.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.lock().is_empty()
    }

    /// Whether `entity` has every required component. An empty requirement
    /// matches everything.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.inner
            .required
            .iter()
            .all(|id| entity.has_component(*id))
    }

    /// Admit `entity` if it matches and is not yet a member, then notify
    /// `entity_added` observers.
    pub fn add_entity_if_match(&self, entity: &Entity) {
        let admitted = {
            let mut members = self.inner.members.lock();
            if !members.has(entity) && self.matches(entity) {
                members.add(entity.clone());
                true
            } else {
                false
            }
        };
        if admitted {
            trace!(entity = entity.id(), family = %self, "entity joined family");
            self.inner.entity_added.emit(entity);
        }
    }

    /// Evict `entity` if it is a member, then notify `entity_removed`
    /// observers.
    pub fn remove_entity(&self, entity: &Entity) {
        let evicted = self.inner.members.lock().remove(entity);
        if evicted {
            trace!(entity = entity.id(), family = %self, "entity left family");
            self.inner.entity_removed.emit(entity);
        }
    }

    /// A component was attached to `entity`. Attaching can only make an
    /// entity match, so this is a plain re-check.
    pub fn on_component_added(&self, entity: &Entity, _component: &ComponentRef) {
        self.add_entity_if_match(entity);
    }

    /// A component was detached from `entity`. Members lose their place if
    /// the component's id is required; non-members are unaffected.
    pub fn on_component_removed(&self, entity: &Entity, component: &ComponentRef) {
        if !self.contains(entity) {
            return;
        }
        if self.inner.required.contains(&component.id()) {
            self.remove_entity(entity);
        }
    }

    /// Emitted when an entity joins this family.
    pub fn entity_added(&self) -> &Signal<Entity> {
        &self.inner.entity_added
    }

    /// Emitted when an entity leaves this family.
    pub fn entity_removed(&self) -> &Signal<Entity> {
        &self.inner.entity_removed
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, id) in self.inner.required.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("required", &self.inner.required)
            .field("members", &self.len())
            .finish()
    }
}
