//! Type-keyed dependency container.
//!
//! A process-wide container is populated at startup with shared services
//! (the [`Logger`](crate::Logger), the [`ReturnHandler`](crate::ReturnHandler),
//! application services). Every request gets a child container whose parent
//! is the process container: lookups fall back to the parent on a miss and a
//! child binding shadows a parent binding of the same type.
//!
//! # Example
//!
//! ```rust
//! use waymark_core::Container;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let mut process = Container::new();
//! process.register(Arc::new(Database { url: "postgres://localhost/db".into() }));
//!
//! let mut request = Container::child(Arc::new(process));
//! request.register(Arc::new(Database { url: "sqlite::memory:".into() }));
//!
//! let db: Arc<Database> = request.resolve().unwrap();
//! assert_eq!(db.url, "sqlite::memory:");
//! assert_eq!(request.parent().unwrap().resolve::<Database>().unwrap().url, "postgres://localhost/db");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::InjectionError;

/// A dependency container with an optional parent.
#[derive(Default, Clone)]
pub struct Container {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    parent: Option<Arc<Container>>,
}

impl Container {
    /// Creates a new empty root container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty container that falls back to `parent`.
    #[must_use]
    pub fn child(parent: Arc<Container>) -> Self {
        Self {
            services: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Returns the parent container, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Container>> {
        self.parent.as_ref()
    }

    /// Binds a value in this container, replacing any previous value of
    /// the same type held here. Parent bindings are left untouched.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Resolves a value, consulting the parent chain on a miss.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.services.get(&TypeId::of::<T>()) {
            Some(service) => Arc::clone(service).downcast::<T>().ok(),
            None => self.parent.as_ref().and_then(|p| p.resolve::<T>()),
        }
    }

    /// Resolves a value or returns an error naming the type.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError::NotRegistered`] if neither this container
    /// nor any ancestor binds `T`.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Checks if `T` is bound here or in an ancestor.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<T>())
    }

    /// Checks if a type identity is bound here or in an ancestor.
    #[must_use]
    pub fn contains_id(&self, id: TypeId) -> bool {
        self.services.contains_key(&id) || self.parent.as_ref().is_some_and(|p| p.contains_id(id))
    }

    /// Returns the number of values bound directly in this container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if nothing is bound directly in this container.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
