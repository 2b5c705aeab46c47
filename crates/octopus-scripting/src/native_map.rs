//! String-keyed maps shared between the host and scripts

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::sync::Arc;

/// A native map shared with the script side
pub type SharedMap = Arc<Mutex<NativeMap>>;

/// Property-style access to a string map.
///
/// Anything that can answer these can be exposed to scripts through the
/// value bridge.
pub trait MapAccess {
    /// Look up a key
    fn get(&self, key: &str) -> Option<&str>;

    /// Insert or overwrite a key
    fn set(&mut self, key: &str, value: String);

    /// Remove a key
    fn remove(&mut self, key: &str);
}

/// Ordered string-to-string map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeMap {
    entries: BTreeMap<String, String>,
}

impl NativeMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a value, returning the previous one
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a key
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Wrap the map for sharing with a script context
    pub fn into_shared(self) -> SharedMap {
        Arc::new(Mutex::new(self))
    }
}

impl MapAccess for NativeMap {
    fn get(&self, key: &str) -> Option<&str> {
        NativeMap::get(self, key)
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NativeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for NativeMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl IntoIterator for NativeMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<BTreeMap<String, String>> for NativeMap {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}
