use super::Entity;

/// Ordered group of entities plus server paging metadata.
///
/// `total_count` is whatever the server reported for the full result set; it is
/// independent of [`count`](Self::count), which is always `items.len()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityCollection {
    items: Vec<Entity>,
    total_count: Option<u64>,
    next_link: Option<String>,
    delta_link: Option<String>,
}

impl EntityCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_items(items: Vec<Entity>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn add(&mut self, entity: Entity) {
        self.items.push(entity);
    }

    /// Remove the item at `index`, shifting later items down.
    pub fn remove(&mut self, index: usize) -> Option<Entity> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.items.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Entity> {
        self.items.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Entity> {
        self.items.last()
    }

    /// Number of items held, never the server-reported total.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn set_total_count(&mut self, total: Option<u64>) {
        self.total_count = total;
    }

    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    pub fn set_next_link(&mut self, link: Option<String>) {
        self.next_link = link;
    }

    #[must_use]
    pub fn delta_link(&self) -> Option<&str> {
        self.delta_link.as_deref()
    }

    pub fn set_delta_link(&mut self, link: Option<String>) {
        self.delta_link = link;
    }

    /// More pages are available from the server.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.next_link.is_some()
    }
}

impl IntoIterator for EntityCollection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntityCollection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a mut EntityCollection {
    type Item = &'a mut Entity;
    type IntoIter = std::slice::IterMut<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

impl FromIterator<Entity> for EntityCollection {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().collect())
    }
}

/// Serializes as the list of flat entity views.
impl serde::Serialize for EntityCollection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}
