//! # Waymark
//!
//! **A small HTTP router with segment trees, typed handlers and a
//! middleware pipeline.**
//!
//! - **Pattern routes**: static segments, `:name` captures, inline regex
//!   (`:id([0-9]+)`), type suffixes (`:id:int`), optional last segments
//!   (`?:id`), path-extension splits (`*.*`) and catch-alls (`*`)
//! - **Per-method trees** with an exact-pattern fast path
//! - **Handler chains**: global middleware, then route handlers, then a
//!   terminal action; the first handler to write a status ends the chain
//! - **Typed inputs**: handlers may take a logger or any service bound in
//!   the container, checked when the route is registered
//! - **Logger and recovery middleware**, a Tokio/Hyper listener and typed
//!   configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waymark::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WaymarkError> {
//!     let mut app = Waymark::classic();
//!     app.get("/", [Handler::new(|_| "hello world")])?;
//!     app.get("/users/:id:int", [Handler::new(|ctx| format!("user {}", ctx.param("id").unwrap_or("")))])?;
//!
//!     app.run_from_env().await
//! }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Request → prefix strip → before-hooks → route lookup
//!                                            │
//!          ┌── match ── middleware ++ route handlers ++ action
//!          └── miss ─── middleware ++ Not-Found chain
//!
//! handler error ──► error chain (HandlerError bound in the request container)
//! ```

#![doc(html_root_url = "https://docs.rs/waymark/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;

pub use app::{BeforeHandler, Waymark};
pub use error::WaymarkError;

pub use waymark_config as config;
pub use waymark_core as core;
pub use waymark_middleware as middleware;
pub use waymark_router as router;
pub use waymark_server as server;
pub use waymark_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use waymark::prelude::*;
///
/// let app = Waymark::new();
/// # let _ = app;
/// ```
pub mod prelude {
    pub use crate::{BeforeHandler, Waymark, WaymarkError};

    pub use waymark_config::{ConfigLoader, Environment, WaymarkConfig};
    pub use waymark_core::{
        Container, Context, HandlerError, Handler, IntoReply, Logger, Reply, ResponseWriter, ReturnHandler,
    };
    pub use waymark_middleware::{logger, recovery};
    pub use waymark_router::Params;
    pub use waymark_server::{RouteHandle, ServerError, ShutdownSignal};
}
