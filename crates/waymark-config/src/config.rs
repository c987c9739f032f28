//! Main configuration types.
//!
//! This module provides the top-level [`WaymarkConfig`] struct and its builder.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Environment, LogFormat, LoggingConfig, ServerConfig};

/// Complete Waymark application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use waymark_config::WaymarkConfig;
///
/// let config = WaymarkConfig::default();
/// assert_eq!(config.server.bind_addr(), "0.0.0.0:4000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WaymarkConfig {
    /// Deployment environment.
    #[serde(default)]
    pub env: Environment,

    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WaymarkConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> WaymarkConfigBuilder {
        WaymarkConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the port is zero
    /// - the host is neither an IP address nor a host name
    /// - the URL prefix is non-empty and does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid_value("server.port", "must not be zero"));
        }

        if !is_valid_host(&self.server.host) {
            return Err(ConfigError::invalid_value(
                "server.host",
                format!("invalid host: {:?}", self.server.host),
            ));
        }

        let prefix = &self.server.url_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "server.url_prefix",
                format!("must start with '/': {prefix}"),
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs.
    ///
    /// # Example
    ///
    /// ```
    /// use waymark_config::{Environment, WaymarkConfig};
    ///
    /// let config = WaymarkConfig::development();
    /// assert_eq!(config.env, Environment::Development);
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.env = Environment::Development;
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON info logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.env = Environment::Production;
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config
    }
}

fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Builder for [`WaymarkConfig`].
#[derive(Debug, Default)]
pub struct WaymarkConfigBuilder {
    server: Option<ServerConfig>,
    logging: Option<LoggingConfig>,
    env: Option<Environment>,
}

impl WaymarkConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the environment.
    #[must_use]
    pub fn env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> WaymarkConfig {
        WaymarkConfig {
            env: self.env.unwrap_or_default(),
            server: self.server.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<WaymarkConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
