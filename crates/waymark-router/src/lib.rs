//! Pattern-compiling segment tree router for Waymark.
//!
//! This crate compiles route patterns segment by segment, stores them in an
//! ordered tree per HTTP method and matches request paths with
//! backtracking across tree levels.
//!
//! # Features
//!
//! - **Typed captures**: `:id`, `:id:int`, `:name:string`, `:id([0-9]+)`,
//!   and literals mixed with captures such as `v:major.:minor`
//! - **Catch-alls**: `*` spanning any number of segments, `*.*` splitting
//!   the remainder into `:path` and `:ext`
//! - **Optional segments**: `/user/?:id` matches `/user` and `/user/7`
//! - **Deterministic precedence**: most specific first, independent of
//!   registration order
//! - **Per-segment percent decoding**: `%2F` never creates a new segment
//!
//! # Example
//!
//! ```rust
//! use waymark_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/a/:id", "capture").unwrap();
//! router.insert("GET", "/a/static", "static").unwrap();
//! router.insert("GET", "/a/*", "all").unwrap();
//!
//! let found = router.match_route(&Method::GET, "/a/static").unwrap();
//! assert_eq!(*found.value(), "static");
//!
//! let found = router.match_route(&Method::GET, "/a/b/c").unwrap();
//! assert_eq!(*found.value(), "all");
//! assert_eq!(found.params.get("*"), Some("b/c"));
//! ```

mod error;
mod node;
mod params;
mod pattern;
mod router;
mod table;

pub use error::{PatternError, RouterError};
pub use node::{Leaf, Node};
pub use params::Params;
pub use pattern::{CompiledPattern, PatternKind};
pub use router::{MethodFilter, RouteMatch, Router, SUPPORTED_METHODS};
pub use table::RouteTable;
