//! Logging setup for Waymark applications.
//!
//! Every Waymark crate logs through `tracing` macros. This crate installs
//! the subscriber that renders those events: JSON lines in production,
//! pretty multi-line output in development.
//!
//! # Example
//!
//! ```rust,ignore
//! use waymark_telemetry::{init_logging, LogConfig};
//!
//! fn main() {
//!     init_logging(&LogConfig::production()).expect("logging");
//!     tracing::info!("listening");
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
