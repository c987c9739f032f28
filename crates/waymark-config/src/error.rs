//! Errors raised while assembling a [`WaymarkConfig`](crate::WaymarkConfig).
//!
//! Failures fall in two groups: the source could not be turned into a
//! config at all (missing file, unreadable bytes, unknown or malformed
//! format), or it parsed but a value is unusable.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `with_file` was pointed at a path that does not exist.
    #[error("no config file at {}", path.display())]
    FileNotFound {
        /// The path that was asked for.
        path: PathBuf,
    },

    /// The file exists but reading it failed.
    #[error("could not read config file {}", path.display())]
    ReadError {
        /// The file being read.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Only `toml` and `json` sources are understood.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// TOML syntax or schema error.
    #[error("malformed TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error.
    #[error("malformed JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file exists but could not be applied.
    #[error("dotenv: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A value parsed but is out of range, e.g. port 0.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field, such as `server.port`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable held text the field cannot take.
    #[error("${var}: {reason}")]
    EnvParseError {
        /// Variable name, prefix included.
        var: String,
        /// What was expected instead.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub(crate) fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Rejects the value of `field`.
    ///
    /// ```rust
    /// use waymark_config::ConfigError;
    ///
    /// let err = ConfigError::invalid_value("server.port", "must not be zero");
    /// assert_eq!(err.to_string(), "server.port: must not be zero");
    /// ```
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Returns true when the config source itself was unusable, as opposed
    /// to a single bad value inside it.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        !matches!(self, Self::InvalidValue { .. } | Self::EnvParseError { .. })
    }
}
