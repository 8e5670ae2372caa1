//! JSON views of normalized results.
//!
//! Unlike the flat `Serialize` view of `Entity`, these carry id, type, eTag and
//! navigation as well.

use odata_adapter::{Entity, EntityCollection, Navigation};
use serde_json::{Map, Value, json};

#[must_use]
pub fn entity(entity: &Entity) -> Value {
    let related: Map<String, Value> = entity
        .navigations()
        .map(|(name, nav)| (name.to_owned(), navigation(nav)))
        .collect();

    json!({
        "type": entity.entity_type(),
        "id": entity.id(),
        "etag": entity.etag(),
        "properties": entity.properties(),
        "navigation": related,
    })
}

#[must_use]
pub fn collection(collection: &EntityCollection) -> Value {
    json!({
        "count": collection.count(),
        "total_count": collection.total_count(),
        "next_link": collection.next_link(),
        "delta_link": collection.delta_link(),
        "items": collection.iter().map(entity).collect::<Vec<_>>(),
    })
}

fn navigation(nav: &Navigation) -> Value {
    match nav {
        Navigation::Deferred => Value::Null,
        Navigation::Single(e) => entity(e),
        Navigation::Collection(c) => collection(c),
    }
}
