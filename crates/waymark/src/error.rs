//! Application-level errors.

use thiserror::Error;
use waymark_config::ConfigError;
use waymark_server::ServerError;

/// Errors from building or running a [`Waymark`](crate::Waymark) application.
#[derive(Debug, Error)]
pub enum WaymarkError {
    /// Loading or validating configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registration or serving failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}
