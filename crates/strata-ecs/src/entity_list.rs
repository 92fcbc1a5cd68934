use std::collections::HashMap;

use crate::entity::{Entity, EntityId};

struct Node {
    entity: Entity,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Insertion-ordered set of entities.
///
/// A doubly linked list threaded through a slot vector, plus an id → slot
/// index. Add, remove and membership tests are O(1); freed slots are reused.
#[derive(Default)]
pub struct EntityList {
    slots: Vec<Option<Node>>,
    free_list: Vec<usize>,
    index: HashMap<EntityId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity at the tail.
    ///
    /// Callers must not add an entity that is already present; doing so is
    /// ignored.
    pub fn add(&mut self, entity: Entity) {
        let present = self.index.contains_key(&entity.id());
        debug_assert!(!present, "entity {entity:?} added to list twice");
        if present {
            return;
        }

        let id = entity.id();
        let node = Node {
            entity,
            prev: self.tail,
            next: None,
        };
        let slot = if let Some(slot) = self.free_list.pop() {
            self.slots[slot] = Some(node);
            slot
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(id, slot);
    }

    /// Unlink an entity. Returns `true` if it was present.
    pub fn remove(&mut self, entity: &Entity) -> bool {
        let Some(slot) = self.index.remove(&entity.id()) else {
            return false;
        };
        let Some(node) = self.slots[slot].take() else {
            return false;
        };

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free_list.push(slot);
        true
    }

    pub fn has(&self, entity: &Entity) -> bool {
        self.index.contains_key(&entity.id())
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Copy of the entities in insertion order.
    ///
    /// The copy is detached from the list, so callers may add or remove
    /// entities while walking it.
    pub fn to_vec(&self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let node = self.node(slot);
            entities.push(node.entity.clone());
            cursor = node.next;
        }
        entities
    }

    fn node(&self, slot: usize) -> &Node {
        self.slots[slot]
            .as_ref()
            .expect("linked slot must be occupied")
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node {
        self.slots[slot]
            .as_mut()
            .expect("linked slot must be occupied")
    }
}
