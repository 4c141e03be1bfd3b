//! Tag catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::TagId;

/// A user tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag id.
    pub id: TagId,
    /// Display name, unique per mailbox.
    pub name: String,
    /// Color index or RGB string, if set.
    #[serde(default)]
    pub color: Option<String>,
}

/// All tags known for the mailbox, indexed by id and by name.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    by_id: HashMap<TagId, Tag>,
    by_name: HashMap<String, TagId>,
}

impl TagCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tag.
    pub fn insert(&mut self, tag: Tag) {
        if let Some(previous) = self.by_id.get(&tag.id) {
            self.by_name.remove(&previous.name);
        }
        self.by_name.insert(tag.name.clone(), tag.id.clone());
        self.by_id.insert(tag.id.clone(), tag);
    }

    /// Looks up a tag by id.
    #[must_use]
    pub fn get(&self, id: &TagId) -> Option<&Tag> {
        self.by_id.get(id)
    }

    /// Resolves a tag name to its id.
    #[must_use]
    pub fn id_for_name(&self, name: &str) -> Option<&TagId> {
        self.by_name.get(name)
    }

    /// Resolves ids to tags, skipping unknown ids.
    #[must_use]
    pub fn resolve(&self, ids: &[TagId]) -> Vec<&Tag> {
        ids.iter().filter_map(|id| self.by_id.get(id)).collect()
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<Tag> for TagCatalog {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for tag in iter {
            catalog.insert(tag);
        }
        catalog
    }
}
