//! Router error types.
//!
//! Every error in this module is a configuration error: it is raised while
//! routes are being registered, never while a request is being matched.

use thiserror::Error;

/// Errors raised while compiling a route pattern segment.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The assembled regular expression failed to compile.
    #[error("invalid regular expression in pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The pattern segment as registered.
        pattern: String,
        /// Underlying regex compilation error.
        #[source]
        source: Box<regex::Error>,
    },

    /// An explicit capture group was opened but never closed.
    #[error("unbalanced capture group in pattern '{pattern}'")]
    UnbalancedGroup {
        /// The pattern segment as registered.
        pattern: String,
    },

    /// The compiled expression has a different number of groups than the
    /// pattern declares capture names.
    #[error(
        "pattern '{pattern}' declares {names} capture name(s) but its expression has {groups} group(s)"
    )]
    CaptureCountMismatch {
        /// The pattern segment as registered.
        pattern: String,
        /// Number of declared capture names.
        names: usize,
        /// Number of capture groups in the compiled expression.
        groups: usize,
    },
}

/// Errors raised by the registration API of [`Router`](crate::Router).
#[derive(Debug, Error)]
pub enum RouterError {
    /// The HTTP method is neither supported nor the `*` wildcard.
    #[error("unknown http method: {0}")]
    UnknownMethod(String),

    /// A segment of the route pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_method_display() {
        let err = RouterError::UnknownMethod("BREW".to_string());
        assert_eq!(err.to_string(), "unknown http method: BREW");
    }

    #[test]
    fn test_capture_mismatch_display() {
        let err = PatternError::CaptureCountMismatch {
            pattern: ":id((a)(b))".to_string(),
            names: 1,
            groups: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains(":id((a)(b))"));
        assert!(msg.contains("1 capture name"));
        assert!(msg.contains("3 group"));
    }

    #[test]
    fn test_pattern_error_converts_to_router_error() {
        let err: RouterError = PatternError::UnbalancedGroup {
            pattern: ":id([0-9]+".to_string(),
        }
        .into();
        assert!(matches!(err, RouterError::Pattern(_)));
        assert!(err.to_string().contains("unbalanced"));
    }
}
