use std::collections::HashSet;

use crate::key::Key;

/// Foreign keys actually used by rows of a child file type.
#[derive(Debug, Default)]
pub struct EncounteredKeySet(HashSet<Key>);

impl EncounteredKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key) {
        self.0.insert(key);
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
