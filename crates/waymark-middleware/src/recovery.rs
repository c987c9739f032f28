//! Panic recovery middleware.
//!
//! Runs the rest of the chain inside [`std::panic::catch_unwind`]. When a
//! later handler panics the payload is logged and, unless a status was
//! already written, a `500 Internal Server Error` is written. Once the
//! status is out, first-writer-wins stops the chain.
//!
//! In the [`Environment::Development`] environment the response carries a
//! small HTML page naming the panic; in every other environment the body
//! is empty. The environment is resolved from the container and defaults
//! to development when nothing is bound.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use waymark_config::Environment;
use waymark_core::{Context, Handler, Logger};

/// Returns the panic recovery middleware.
pub fn recovery() -> Handler {
    Handler::with_logger(recover)
}

fn recover(ctx: &mut Context, log: &Logger) {
    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
        return;
    };

    let message = panic_message(payload.as_ref());
    tracing::error!(
        logger = %log.name(),
        http.method = %ctx.request().method(),
        http.path = %ctx.request().uri().path(),
        panic = %message,
        "PANIC: {message}"
    );

    if ctx.written() {
        return;
    }

    let development = ctx.get::<Environment>().map_or(true, |env| env.is_development());
    let response = ctx.response_mut();
    if development {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        response.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        response.write(panic_page(&message));
    } else {
        response.write_header(StatusCode::INTERNAL_SERVER_ERROR);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn panic_page(message: &str) -> String {
    let message = escape_html(message);
    format!(
        "<html><head><title>PANIC: {message}</title></head>\
         <body><h1>PANIC</h1><pre>{message}</pre></body></html>"
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
