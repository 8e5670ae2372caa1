//! Canonical in-memory model every response normalizer converges to.

mod collection;
mod entity;

pub use collection::EntityCollection;
pub use entity::{Entity, EntityId, Navigation, UNKNOWN_ENTITY_TYPE};
