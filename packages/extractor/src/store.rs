//! Per-run store of values returned by element callbacks.

use std::collections::HashMap;

/// Values kept by callbacks, keyed by the path of the element that kept them.
///
/// Entries live until the end of the run and are only reachable through
/// back-references whose key equals the stored path exactly.
#[derive(Debug, Default)]
pub struct ElementStore {
    entries: HashMap<String, String>,
}

impl ElementStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a stored value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Store a value under a path, replacing any earlier value for that path.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
