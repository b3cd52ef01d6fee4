use std::collections::HashMap;

use crate::key::Key;

/// Every primary key seen so far for one file type.
///
/// Keys remember the file that defined them, so orphan parents can be
/// reported against the right file when a type is split over several files.
#[derive(Debug, Default)]
pub struct PrimaryKeySet {
    keys: HashMap<Key, usize>,
    files: Vec<String>,
}

impl PrimaryKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the next file keys will be inserted from.
    pub fn begin_file(&mut self, file_name: &str) -> usize {
        self.files.push(file_name.to_string());
        self.files.len() - 1
    }

    /// Adds `key`; false if it was already present.
    pub fn insert(&mut self, key: Key, file: usize) -> bool {
        self.try_insert(key, file).is_ok()
    }

    /// Adds `key`, handing it back when it is a duplicate.
    pub fn try_insert(&mut self, key: Key, file: usize) -> Result<(), Key> {
        if self.keys.contains_key(&key) {
            return Err(key);
        }
        self.keys.insert(key, file);
        Ok(())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains_key(key)
    }

    /// Keys with the name of the file that defined them.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &str)> {
        self.keys.iter().map(|(key, file)| {
            let name = self.files.get(*file).map_or("", String::as_str);
            (key, name)
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
