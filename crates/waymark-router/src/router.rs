//! Method-aware router over per-method segment trees.
//!
//! This module provides [`Router`], the registration and lookup API that
//! ties the route trees and the exact-pattern [`RouteTable`] together.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::error::RouterError;
use crate::node::{Leaf, Node};
use crate::params::Params;
use crate::table::RouteTable;

/// Methods a route can be registered for.
pub const SUPPORTED_METHODS: [Method; 2] = [Method::GET, Method::POST];

/// The methods named by a registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// A single supported method.
    One(Method),
    /// `*`: every method in [`SUPPORTED_METHODS`].
    Any,
}

impl MethodFilter {
    /// Parses a method name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownMethod`] for anything other than a
    /// supported method or `*`.
    pub fn parse(method: &str) -> Result<Self, RouterError> {
        if method == "*" {
            return Ok(Self::Any);
        }
        let upper = method.to_ascii_uppercase();
        SUPPORTED_METHODS
            .iter()
            .find(|m| m.as_str() == upper)
            .map(|m| Self::One(m.clone()))
            .ok_or_else(|| RouterError::UnknownMethod(method.to_string()))
    }

    /// Returns the concrete methods this filter expands to.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        match self {
            Self::One(method) => vec![method.clone()],
            Self::Any => SUPPORTED_METHODS.to_vec(),
        }
    }
}

/// A successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<T> {
    /// The matched leaf.
    pub leaf: Arc<Leaf<T>>,
    /// Parameters captured along the way.
    pub params: Params,
}

impl<T> RouteMatch<T> {
    /// Returns the value registered for the matched route.
    #[must_use]
    pub fn value(&self) -> &T {
        self.leaf.value()
    }
}

/// A router keeping one segment tree per HTTP method.
///
/// # Example
///
/// ```rust
/// use waymark_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert("GET", "/users", "list").unwrap();
/// router.insert("GET", "/users/:id([0-9]+)", "show").unwrap();
/// router.insert("*", "/files/*.*", "file").unwrap();
///
/// let found = router.match_route(&Method::GET, "/users/42").unwrap();
/// assert_eq!(*found.value(), "show");
/// assert_eq!(found.params.param("id"), Some("42"));
///
/// let found = router.match_route(&Method::POST, "/files/a.txt").unwrap();
/// assert_eq!(found.params.param("ext"), Some("txt"));
/// ```
///
/// # Precedence
///
/// Within one tree level candidates are tried in this order, and the first
/// whose continuation also matches wins:
///
/// 1. **Static** segments (`/users/me`)
/// 2. **Regex captures** (`/users/:id:int`)
/// 3. **Path extension** (`/files/*.*`)
/// 4. **Open captures** (`/users/:name`)
/// 5. **Catch-all** (`/assets/*`)
pub struct Router<T> {
    trees: HashMap<Method, Node<T>>,
    table: RouteTable<T>,
}

impl<T: Clone> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Router<T> {
    /// Creates a router with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            table: RouteTable::new(),
        }
    }

    /// Registers `value` under `pattern` for `method` (`GET`, `POST` or `*`).
    ///
    /// Registering the same `(method, pattern)` again returns the leaf
    /// created the first time and leaves the tree unchanged. For `*` the
    /// leaf of the first supported method is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError`] if the method is unknown or a segment of the
    /// pattern fails to compile.
    pub fn insert(&mut self, method: &str, pattern: &str, value: T) -> Result<Arc<Leaf<T>>, RouterError> {
        let methods = MethodFilter::parse(method)?.methods();

        let mut first = None;
        for method in methods {
            let leaf = match self.table.get(&method, pattern) {
                Some(existing) => {
                    tracing::debug!(%method, pattern, "route already registered");
                    existing
                }
                None => {
                    let leaf = self
                        .trees
                        .entry(method.clone())
                        .or_insert_with(Node::root)
                        .insert(pattern, value.clone())?;
                    tracing::debug!(%method, pattern, kind = ?leaf.pattern().kind(), "route registered");
                    self.table.insert(method, pattern, Arc::clone(&leaf));
                    leaf
                }
            };
            first.get_or_insert(leaf);
        }

        first.ok_or_else(|| RouterError::UnknownMethod(method.to_string()))
    }
}

impl<T> Router<T> {
    /// Looks up the route for a request.
    ///
    /// A fully static pattern spelled exactly like `path` is served from
    /// the route table; anything else walks the method's tree. `HEAD` has
    /// no tree of its own and is answered by the `GET` routes.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<T>> {
        let method = if *method == Method::HEAD && !self.trees.contains_key(&Method::HEAD) {
            &Method::GET
        } else {
            method
        };
        let tree = self.trees.get(method)?;

        if let Some(leaf) = self.table.get_static(method, path) {
            return Some(RouteMatch {
                leaf,
                params: Params::new(),
            });
        }

        let (leaf, params) = tree.match_path(path)?;
        Some(RouteMatch { leaf, params })
    }

    /// Returns the tree registered for `method`, if any.
    #[must_use]
    pub fn tree(&self, method: &Method) -> Option<&Node<T>> {
        self.trees.get(method)
    }

    /// Returns the exact-pattern table.
    #[must_use]
    pub fn table(&self) -> &RouteTable<T> {
        &self.table
    }

    /// Returns the number of registered `(method, pattern)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<T> std::fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.trees.keys().collect::<Vec<_>>())
            .field("routes", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_new() {
        let router: Router<u8> = Router::new();
        assert!(router.is_empty());
        assert!(router.match_route(&Method::GET, "/").is_none());
    }

    #[test]
    fn test_method_filter_parse() {
        assert_eq!(MethodFilter::parse("get").unwrap(), MethodFilter::One(Method::GET));
        assert_eq!(MethodFilter::parse("POST").unwrap(), MethodFilter::One(Method::POST));
        assert_eq!(MethodFilter::parse("*").unwrap(), MethodFilter::Any);
        assert!(matches!(
            MethodFilter::parse("BREW"),
            Err(RouterError::UnknownMethod(m)) if m == "BREW"
        ));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let mut router = Router::new();
        assert!(router.insert("PATCH", "/users", 1).is_err());
        assert!(router.is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut router = Router::new();
        let err = router.insert("GET", "/users/:id([0-9+)", 1).unwrap_err();
        assert!(matches!(err, RouterError::Pattern(_)));
        assert!(router.is_empty());
    }

    #[test]
    fn test_methods_are_separate() {
        let mut router = Router::new();
        router.insert("GET", "/users", "list").unwrap();
        router.insert("POST", "/users", "create").unwrap();

        assert_eq!(*router.match_route(&Method::GET, "/users").unwrap().value(), "list");
        assert_eq!(*router.match_route(&Method::POST, "/users").unwrap().value(), "create");
        assert!(router.match_route(&Method::DELETE, "/users").is_none());
    }

    #[test]
    fn test_head_falls_back_to_get_routes() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", "show").unwrap();
        router.insert("GET", "/health", "ok").unwrap();
        router.insert("POST", "/upload", "store").unwrap();

        let found = router.match_route(&Method::HEAD, "/users/7").unwrap();
        assert_eq!(*found.value(), "show");
        assert_eq!(found.params.param("id"), Some("7"));
        assert_eq!(*router.match_route(&Method::HEAD, "/health").unwrap().value(), "ok");
        assert!(router.match_route(&Method::HEAD, "/upload").is_none());
    }

    #[test]
    fn test_any_registers_every_supported_method() {
        let mut router = Router::new();
        router.insert("*", "/ping", "pong").unwrap();

        for method in SUPPORTED_METHODS {
            assert_eq!(*router.match_route(&method, "/ping").unwrap().value(), "pong");
        }
        assert_eq!(router.len(), SUPPORTED_METHODS.len());
    }

    #[test]
    fn test_duplicate_registration_returns_existing_leaf() {
        let mut router = Router::new();
        let first = router.insert("GET", "/a/:id", "first").unwrap();
        let second = router.insert("get", "/a/:id", "second").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(router.len(), 1);
        let tree = router.tree(&Method::GET).unwrap();
        assert_eq!(tree.children()[0].leaves().len(), 1);
    }

    #[test]
    fn test_static_path_uses_table() {
        let mut router = Router::new();
        let leaf = router.insert("GET", "/health", "ok").unwrap();

        let found = router.match_route(&Method::GET, "/health").unwrap();
        assert!(Arc::ptr_eq(&found.leaf, &leaf));
        assert!(found.params.is_empty());
    }

    #[test]
    fn test_capture_pattern_text_is_not_a_shortcut() {
        let mut router = Router::new();
        router.insert("GET", "/user/:id([0-9]+)", "user").unwrap();
        assert!(router.match_route(&Method::GET, "/user/:id([0-9]+)").is_none());
    }

    #[test]
    fn test_precedence_across_registration_orders() {
        let patterns = ["/a/:id", "/a/static", "/a/*"];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

        for order in orders {
            let mut router = Router::new();
            for i in order {
                router.insert("GET", patterns[i], patterns[i]).unwrap();
            }
            let found = router.match_route(&Method::GET, "/a/static").unwrap();
            assert_eq!(*found.value(), "/a/static");
        }
    }

    #[test]
    fn test_complex_paths() {
        let mut router = Router::new();
        router.insert("GET", "/api/v1/users", "list").unwrap();
        router.insert("GET", "/api/v1/users/:user", "get").unwrap();
        router.insert("GET", "/api/v1/users/:user/posts", "posts").unwrap();
        router.insert("GET", "/api/v1/users/:user/posts/:post:int", "post").unwrap();

        let found = router.match_route(&Method::GET, "/api/v1/users/123/posts/456").unwrap();
        assert_eq!(*found.value(), "post");
        assert_eq!(found.params.param("user"), Some("123"));
        assert_eq!(found.params.param("post"), Some("456"));

        let found = router.match_route(&Method::GET, "/api/v1/users/123/posts").unwrap();
        assert_eq!(*found.value(), "posts");
    }
}
