//! # Waymark Core
//!
//! The dispatch pipeline of the Waymark router.
//!
//! This crate provides the types a handler chain runs against:
//!
//! - [`Container`] - Type-keyed value store with parent fallback
//! - [`Handler`] - One chain step, built from a closed set of signatures
//! - [`Reply`] / [`ReturnHandler`] - Handler return values and their conversion
//! - [`ResponseWriter`] - Write-once-status response sink
//! - [`Context`] - Per-request state and the chain cursor
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use waymark_core::{Container, Context, Handler};
//!
//! let chain = vec![
//!     Handler::new(|ctx| {
//!         ctx.response_mut().headers_mut().insert("x-trace", "1".parse().unwrap());
//!     }),
//!     Handler::new(|_| (StatusCode::CREATED, "created")),
//!     Handler::new(|_| "never runs"),
//! ];
//!
//! let request = Request::builder().uri("/items").body(Bytes::new()).unwrap();
//! let mut ctx = Context::new(request, Arc::new(Container::new())).chain(chain, None);
//! ctx.run();
//!
//! let response = ctx.into_response();
//! assert_eq!(response.status(), Some(StatusCode::CREATED));
//! assert_eq!(response.body(), b"created");
//! ```

#![doc(html_root_url = "https://docs.rs/waymark-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod di;
mod error;
mod handler;
mod reply;
mod response;

pub use context::{Context, ErrorChain, Logger, PeerAddr};
pub use di::Container;
pub use error::{HandlerError, InjectionError};
pub use handler::{validate_chain, ChainScope, Dependency, Handler, HandlerKind};
pub use reply::{default_return_handler, IntoBody, IntoReply, Reply, ReturnHandler};
pub use response::{BeforeHook, ResponseWriter};
pub use waymark_router::Params;
