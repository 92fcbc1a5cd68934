//! Strata ECS - Entity Component System with cached families
//!
//! Entities own their components and announce every change. A world follows
//! those announcements and keeps one cached family per requested component
//! set, so systems can fetch "every entity with A and B" without scanning,
//! and can subscribe to entities entering or leaving that set.

mod component;
mod config;
mod entity;
mod entity_list;
mod error;
mod family;
mod signal;
mod system;
mod world;

pub use component::{Component, ComponentId, ComponentRef};
pub use config::{FamilyKeyMode, WorldConfig};
pub use entity::{Entity, EntityId, WeakEntity};
pub use entity_list::EntityList;
pub use error::EcsError;
pub use family::Family;
pub use signal::{Disposable, DisposeBag, Signal, Subscription};
pub use strata_core::TickInfo;
pub use system::{from_fn, FnSystem, System, SystemHandle, WorldRef};
pub use world::{FamilyKey, WeakWorld, World};
