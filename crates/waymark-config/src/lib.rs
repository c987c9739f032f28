//! Typed configuration system for Waymark.
//!
//! This crate provides a strongly-typed configuration for Waymark
//! applications with support for:
//! - TOML and JSON configuration files
//! - The plain `HOST` / `PORT` variables and `PREFIX__SECTION__KEY` overrides
//! - `.env` files
//! - Strict validation (fails on unknown fields)
//!
//! # Example
//!
//! ```no_run
//! use waymark_config::ConfigLoader;
//!
//! # fn main() -> Result<(), waymark_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("waymark.toml")?
//!     .with_listen_env()
//!     .with_env_prefix("WAYMARK")
//!     .load()?;
//!
//! println!("listening on {} ({})", config.server.bind_addr(), config.env);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! env = "production"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 4000
//! shutdown_timeout_secs = 30
//! url_prefix = "/api"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{WaymarkConfig, WaymarkConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Environment, LogFormat, LoggingConfig, ServerConfig};
