//! # Waymark Server
//!
//! Request dispatch and the HTTP listener for Waymark.
//!
//! - [`Router`]: global middleware, per-method route trees, the terminal
//!   action and the Not-Found and error chains
//! - [`Server`]: a Tokio and Hyper HTTP/1.1 listener serving any
//!   [`Dispatch`] implementation
//! - [`ShutdownSignal`] and [`ConnectionTracker`]: graceful shutdown
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use http::Request;
//! use waymark_core::Handler;
//! use waymark_server::Router;
//!
//! let mut router = Router::new();
//! router.use_middleware(Handler::new(|ctx| {
//!     ctx.response_mut().headers_mut().insert("x-app", http::HeaderValue::from_static("demo"));
//! }))?;
//! router.get("/hello/:name", [Handler::new(|ctx| format!("hello {}", ctx.param("name").unwrap_or("")))])?;
//!
//! let response = router.handle(Request::get("/hello/ada").body(Bytes::new()).unwrap());
//! assert_eq!(response.body().as_ref(), b"hello ada");
//! assert_eq!(response.headers()["x-app"], "demo");
//! # Ok::<(), waymark_server::ServerError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/waymark-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod router;
pub mod server;
pub mod shutdown;

pub use error::ServerError;
pub use router::{Dispatch, HandlerChain, RouteEntry, RouteHandle, Router};
pub use server::{ResponseBody, Server};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
