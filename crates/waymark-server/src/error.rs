//! Server error types.

use thiserror::Error;
use waymark_core::InjectionError;
use waymark_router::RouterError;

/// Errors raised while configuring or starting a server.
///
/// Registration errors are configuration errors: they are returned to the
/// caller at setup time and never surface while serving requests.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The method or pattern of a route was rejected.
    #[error(transparent)]
    Route(#[from] RouterError),

    /// A handler declares an input the container cannot provide.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// The listener could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while accepting connections.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
