//! # Waymark Middleware
//!
//! Ready-made global middleware for the Waymark router.
//!
//! Both middleware are ordinary [`Handler`](waymark_core::Handler) values:
//! register them with `use_` on the application (or put them at the front
//! of any handler chain). Each one calls [`Context::next`] to run the rest
//! of the chain and then inspects the outcome.
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`logger()`] | Logs `Started` / `Completed` lines with status and elapsed time |
//! | [`recovery()`] | Turns a panic in a later handler into a `500` response |
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use waymark_core::{Container, Context, Handler, Logger};
//! use waymark_middleware::{logger, recovery};
//!
//! let mut process = Container::new();
//! process.register(Arc::new(Logger::default()));
//!
//! let request = Request::builder().uri("/boom").body(Bytes::new()).unwrap();
//! let mut ctx = Context::new(request, Arc::new(process)).chain(
//!     vec![logger(), recovery(), Handler::new(|_| -> &'static str { panic!("boom") })],
//!     None,
//! );
//! ctx.run();
//!
//! assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
//! ```
//!
//! [`Context::next`]: waymark_core::Context::next

#![warn(missing_docs)]

pub mod logger;
pub mod recovery;

pub use logger::logger;
pub use recovery::recovery;
