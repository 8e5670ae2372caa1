use std::fmt;

use serde_json::{Map, Value};

use super::EntityCollection;

/// Entity type used when inference from the payload fails.
pub const UNKNOWN_ENTITY_TYPE: &str = "Unknown";

/// Server-assigned entity key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Integer(i64),
    String(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Integer(i) => write!(f, "{i}"),
            EntityId::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Integer(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::String(value.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::String(value)
    }
}

/// Navigation property slot: not loaded, one related entity, or a related collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Navigation {
    #[default]
    Deferred,
    Single(Box<Entity>),
    Collection(EntityCollection),
}

impl Navigation {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Navigation::Deferred)
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Navigation::Single(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_collection(&self) -> Option<&EntityCollection> {
        match self {
            Navigation::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut EntityCollection> {
        match self {
            Navigation::Collection(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Entity> for Navigation {
    fn from(entity: Entity) -> Self {
        Navigation::Single(Box::new(entity))
    }
}

impl From<EntityCollection> for Navigation {
    fn from(collection: EntityCollection) -> Self {
        Navigation::Collection(collection)
    }
}

/// One normalized resource instance.
///
/// `is_new` is fixed at construction and only changes through
/// [`mark_persisted`](Self::mark_persisted); property and navigation setters never touch it.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: Option<EntityId>,
    type_name: String,
    properties: Map<String, Value>,
    navigation: Vec<(String, Navigation)>,
    etag: Option<String>,
    is_new: bool,
}

impl Entity {
    /// Client-side entity with no id or eTag; `is_new` is `true`.
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self::with_identity(entity_type, None, None)
    }

    /// Entity with known identity; `is_new` is `true` only if both `id` and `etag` are absent.
    #[must_use]
    pub fn with_identity(
        entity_type: impl Into<String>,
        id: Option<EntityId>,
        etag: Option<String>,
    ) -> Self {
        let is_new = id.is_none() && etag.is_none();
        Self {
            id,
            type_name: entity_type.into(),
            properties: Map::new(),
            navigation: Vec::new(),
            etag,
            is_new,
        }
    }

    /// Override the computed `is_new` flag at construction time.
    #[must_use]
    pub fn with_new_flag(mut self, is_new: bool) -> Self {
        self.is_new = is_new;
        self
    }

    /// Construction-time shorthand for [`set_property`](Self::set_property).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }

    /// Record that the server has persisted this entity.
    ///
    /// Sets the id when one is given (an existing id is kept otherwise), replaces the
    /// eTag and clears `is_new`.
    pub fn mark_persisted(&mut self, id: Option<EntityId>, etag: Option<String>) {
        if let Some(id) = id {
            self.id = Some(id);
        }
        self.etag = etag;
        self.is_new = false;
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Set a flat property; a new name is appended after existing ones.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.shift_remove(name)
    }

    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Navigation slot by relation name; `None` when the relation was never set.
    #[must_use]
    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigation
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, nav)| nav)
    }

    pub fn navigation_mut(&mut self, name: &str) -> Option<&mut Navigation> {
        self.navigation
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, nav)| nav)
    }

    pub fn set_navigation(&mut self, name: impl Into<String>, value: impl Into<Navigation>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.navigation_mut(&name) {
            *slot = value;
        } else {
            self.navigation.push((name, value));
        }
    }

    pub fn navigations(&self) -> impl Iterator<Item = (&str, &Navigation)> {
        self.navigation.iter().map(|(n, nav)| (n.as_str(), nav))
    }

    /// Flat properties only; navigation properties are never exported.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.properties.clone()
    }
}

/// Serializes the flat property view, matching [`Entity::to_map`].
impl serde::Serialize for Entity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.properties, serializer)
    }
}
