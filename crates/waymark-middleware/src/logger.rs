//! Request logging middleware.
//!
//! Emits one event when the request enters the chain and one when the rest
//! of the chain has returned:
//!
//! ```text
//! Started GET /users/42 for 10.0.0.7
//! Completed GET /users/42 200 OK in 1.204ms
//! ```
//!
//! The completion event is logged at `error` for `5xx`, `warn` for `4xx`
//! and `info` otherwise, with the method, URI, status and elapsed time as
//! structured fields.

use std::time::{Duration, Instant};

use http::StatusCode;
use waymark_core::{Context, Handler, Logger};

/// Returns the request logging middleware.
///
/// Depends on the process [`Logger`]; the application registers one by
/// default.
pub fn logger() -> Handler {
    Handler::with_logger(log_request)
}

fn log_request(ctx: &mut Context, log: &Logger) {
    let start = Instant::now();
    let method = ctx.request().method().clone();
    let uri = ctx.request().uri().clone();
    let remote = ctx.remote_addr().unwrap_or_else(|| "-".to_string());

    tracing::info!(
        logger = %log.name(),
        http.method = %method,
        http.uri = %uri,
        remote = %remote,
        "Started {method} {uri} for {remote}"
    );

    ctx.next();

    let status = ctx.response().status().unwrap_or(StatusCode::OK);
    let elapsed = start.elapsed();
    let line = completed_line(&method, &uri, status, elapsed);
    let duration_ms = elapsed.as_secs_f64() * 1000.0;

    if status.is_server_error() {
        tracing::error!(logger = %log.name(), http.status_code = status.as_u16(), duration_ms, "{line}");
    } else if status.is_client_error() {
        tracing::warn!(logger = %log.name(), http.status_code = status.as_u16(), duration_ms, "{line}");
    } else {
        tracing::info!(logger = %log.name(), http.status_code = status.as_u16(), duration_ms, "{line}");
    }
}

fn completed_line(method: &http::Method, uri: &http::Uri, status: StatusCode, elapsed: Duration) -> String {
    format!(
        "Completed {method} {uri} {} {} in {elapsed:?}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, Request, Uri};
    use std::sync::{Arc, Mutex};
    use waymark_core::{ChainScope, Container};

    fn process() -> Arc<Container> {
        let mut container = Container::new();
        container.register(Arc::new(Logger::new("test")));
        Arc::new(container)
    }

    #[test]
    fn test_logger_depends_on_logger_service() {
        let handler = logger();
        assert!(handler.validate(&Container::new(), ChainScope::Request).is_err());
        assert!(handler.validate(&process(), ChainScope::Request).is_ok());
    }

    #[test]
    fn test_logger_wraps_rest_of_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = {
            let seen = Arc::clone(&seen);
            Handler::new(move |_| {
                seen.lock().unwrap().push("inner");
                (StatusCode::CREATED, "made")
            })
        };
        let after = {
            let seen = Arc::clone(&seen);
            Handler::new(move |_| seen.lock().unwrap().push("after"))
        };

        let request = Request::builder().uri("/items").body(Bytes::new()).unwrap();
        let mut ctx = Context::new(request, process()).chain(vec![logger(), inner, after], None);
        ctx.run();

        assert_eq!(*seen.lock().unwrap(), vec!["inner"]);
        assert_eq!(ctx.response().status(), Some(StatusCode::CREATED));
        assert_eq!(ctx.response().body(), b"made");
    }

    #[test]
    fn test_logger_passes_through_unwritten_response() {
        let request = Request::builder().uri("/").body(Bytes::new()).unwrap();
        let mut ctx = Context::new(request, process()).chain(vec![logger()], None);
        ctx.run();
        assert!(!ctx.written());
    }

    #[test]
    fn test_completed_line_format() {
        let uri: Uri = "/users/42?full=1".parse().unwrap();
        let line = completed_line(&Method::GET, &uri, StatusCode::NOT_FOUND, Duration::from_millis(3));
        assert_eq!(line, "Completed GET /users/42?full=1 404 Not Found in 3ms");
    }
}
