//! Error types for Waymark core.
//!
//! [`InjectionError`] is a configuration error: it is returned when a
//! handler is registered with an input the container cannot provide.
//! [`HandlerError`] wraps the error a handler returned while serving a
//! request and is what error handlers receive.

use std::fmt;
use std::ops::Deref;

use thiserror::Error;

/// A handler input that cannot be provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// Nothing of this type is bound in the container.
    #[error("failed to inject {type_name}: service not registered")]
    NotRegistered {
        /// The unresolvable type.
        type_name: &'static str,
    },

    /// The type is only bound while the error chain is running.
    #[error("failed to inject {type_name}: only available to error handlers")]
    ErrorChainOnly {
        /// The unresolvable type.
        type_name: &'static str,
    },
}

impl InjectionError {
    /// Creates an error for a type that is not registered.
    #[must_use]
    pub fn not_registered<T: ?Sized>() -> Self {
        Self::NotRegistered {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the name of the type that could not be injected.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NotRegistered { type_name } | Self::ErrorChainOnly { type_name } => type_name,
        }
    }
}

/// The error a handler returned, as seen by the error chain.
///
/// # Example
///
/// ```rust
/// use waymark_core::HandlerError;
///
/// let err = HandlerError::from(anyhow::anyhow!("database unavailable"));
/// assert_eq!(err.to_string(), "database unavailable");
/// ```
#[derive(Debug)]
pub struct HandlerError(anyhow::Error);

impl HandlerError {
    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Converts into the wrapped error.
    #[must_use]
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl Deref for HandlerError {
    type Target = anyhow::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
