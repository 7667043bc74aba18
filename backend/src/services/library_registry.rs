//! Registry of shared libraries games may declare in `libs`.

use std::collections::BTreeSet;

/// Source of known shared library keys.
pub trait LibraryRegistry: Send + Sync {
    /// All known keys, sorted.
    fn list_keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.list_keys().iter().any(|k| k == key)
    }
}

/// Fixed registry loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticLibraryRegistry {
    keys: BTreeSet<String>,
}

impl StaticLibraryRegistry {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl LibraryRegistry for StaticLibraryRegistry {
    fn list_keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}
