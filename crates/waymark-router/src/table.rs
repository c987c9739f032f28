//! Exact-pattern lookup table.
//!
//! The table maps `(method, pattern as registered)` to the leaf created for
//! it. Registration consults it to return existing routes, and dispatch
//! consults it before walking the tree when the request path is spelled
//! exactly like a fully static pattern.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;

use crate::node::Leaf;

struct Entry<T> {
    leaf: Arc<Leaf<T>>,
    is_static: bool,
}

/// Concurrency-safe map from `(method, pattern)` to a registered leaf.
///
/// Readers may run concurrently with each other; a writer excludes all
/// readers.
pub struct RouteTable<T> {
    routes: RwLock<HashMap<Method, HashMap<String, Entry<T>>>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> RouteTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the leaf registered for exactly `pattern`.
    #[must_use]
    pub fn get(&self, method: &Method, pattern: &str) -> Option<Arc<Leaf<T>>> {
        self.routes
            .read()
            .get(method)
            .and_then(|patterns| patterns.get(pattern))
            .map(|entry| Arc::clone(&entry.leaf))
    }

    /// Returns the leaf for `path` only if it was registered by a pattern
    /// without any captures, so the lookup can stand in for a tree match
    /// with no parameters.
    #[must_use]
    pub fn get_static(&self, method: &Method, path: &str) -> Option<Arc<Leaf<T>>> {
        self.routes
            .read()
            .get(method)
            .and_then(|patterns| patterns.get(path))
            .filter(|entry| entry.is_static)
            .map(|entry| Arc::clone(&entry.leaf))
    }

    /// Records the leaf created for `pattern`.
    pub fn insert(&self, method: Method, pattern: &str, leaf: Arc<Leaf<T>>) {
        let is_static = !pattern.contains([':', '*', '?', '%']);
        self.routes
            .write()
            .entry(method)
            .or_default()
            .insert(pattern.to_string(), Entry { leaf, is_static });
    }

    /// Returns the number of recorded `(method, pattern)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.read().values().map(HashMap::len).sum()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for RouteTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable").field("len", &self.len()).finish()
    }
}
