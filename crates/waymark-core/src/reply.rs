//! Handler return values and their conversion into a response.
//!
//! Every handler produces a [`Reply`]. The process-wide [`ReturnHandler`]
//! turns non-empty replies into writes on the response sink:
//!
//! | Reply | Effect |
//! |-------|--------|
//! | [`Reply::Empty`] | nothing, the handler wrote the response itself |
//! | [`Reply::Status`] | status written, then the body |
//! | [`Reply::Body`] | body written verbatim (implicit `200 OK`) |
//! | [`Reply::Error`] | the error chain runs and normal processing stops |

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;

use crate::context::Context;

/// What a handler returned.
#[derive(Debug, Default)]
pub enum Reply {
    /// No value.
    #[default]
    Empty,
    /// A body written with an implicit `200 OK`.
    Body(Bytes),
    /// A status code followed by a body.
    Status(StatusCode, Bytes),
    /// An error for the error chain.
    Error(anyhow::Error),
}

impl Reply {
    /// A body made from any value's textual representation.
    #[must_use]
    pub fn text(value: impl fmt::Display) -> Self {
        Self::Body(Bytes::from(value.to_string()))
    }

    /// Returns true for [`Reply::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Values that can be written verbatim as a response body.
pub trait IntoBody {
    /// Converts into body bytes.
    fn into_body(self) -> Bytes;
}

macro_rules! impl_into_body {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoBody for $ty {
                fn into_body(self) -> Bytes {
                    Bytes::from(self)
                }
            }
        )*
    };
}

impl_into_body!(String, &'static str, Vec<u8>, &'static [u8], Bytes);

impl IntoBody for Cow<'static, str> {
    fn into_body(self) -> Bytes {
        match self {
            Cow::Borrowed(s) => Bytes::from_static(s.as_bytes()),
            Cow::Owned(s) => Bytes::from(s),
        }
    }
}

/// Values a handler may return.
pub trait IntoReply {
    /// Converts into a [`Reply`].
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        Reply::Empty
    }
}

macro_rules! impl_body_reply {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Reply {
                    Reply::Body(self.into_body())
                }
            }
        )*
    };
}

impl_body_reply!(String, &'static str, Vec<u8>, &'static [u8], Bytes, Cow<'static, str>);

impl<B: IntoBody> IntoReply for (StatusCode, B) {
    fn into_reply(self) -> Reply {
        Reply::Status(self.0, self.1.into_body())
    }
}

macro_rules! impl_code_reply {
    ($($code:ty),* $(,)?) => {
        $(
            impl<B: IntoBody> IntoReply for ($code, B) {
                fn into_reply(self) -> Reply {
                    let status = u16::try_from(self.0)
                        .ok()
                        .and_then(|code| StatusCode::from_u16(code).ok());
                    match status {
                        Some(status) => Reply::Status(status, self.1.into_body()),
                        None => Reply::Error(anyhow::anyhow!("handler returned invalid status code {}", self.0)),
                    }
                }
            }
        )*
    };
}

impl_code_reply!(u16, i32);

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Reply {
        self.map_or(Reply::Empty, IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<anyhow::Error>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Reply::Error(err.into()),
        }
    }
}

type ConvertFn = dyn Fn(&mut Context, Reply) + Send + Sync;

/// The process-wide conversion of handler replies into response writes.
///
/// Bind a custom one in the process container to change how replies are
/// rendered.
///
/// # Example
///
/// ```rust
/// use waymark_core::{Reply, ReturnHandler};
///
/// let upper = ReturnHandler::new(|ctx, reply| match reply {
///     Reply::Body(body) => {
///         let text = String::from_utf8_lossy(&body).to_uppercase();
///         ctx.response_mut().write(text);
///     }
///     other => ReturnHandler::default().handle(ctx, other),
/// });
/// # let _ = upper;
/// ```
#[derive(Clone)]
pub struct ReturnHandler(Arc<ConvertFn>);

impl ReturnHandler {
    /// Wraps a conversion function.
    pub fn new(f: impl Fn(&mut Context, Reply) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Applies the conversion.
    pub fn handle(&self, ctx: &mut Context, reply: Reply) {
        (self.0)(ctx, reply);
    }
}

impl Default for ReturnHandler {
    fn default() -> Self {
        Self::new(default_return_handler)
    }
}

impl fmt::Debug for ReturnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReturnHandler")
    }
}

/// The built-in conversion.
pub fn default_return_handler(ctx: &mut Context, reply: Reply) {
    match reply {
        Reply::Empty => {}
        Reply::Body(body) => {
            ctx.response_mut().write(body);
        }
        Reply::Status(status, body) => {
            let response = ctx.response_mut();
            response.write_header(status);
            response.write(body);
        }
        Reply::Error(err) => ctx.fail(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_and_none_are_empty() {
        assert!(().into_reply().is_empty());
        assert!(None::<String>.into_reply().is_empty());
    }

    #[test]
    fn test_text_values_become_bodies() {
        assert!(matches!("hi".into_reply(), Reply::Body(b) if b == "hi"));
        assert!(matches!(String::from("hi").into_reply(), Reply::Body(b) if b == "hi"));
        assert!(matches!(Some("x").into_reply(), Reply::Body(b) if b == "x"));
    }

    #[test]
    fn test_byte_values_are_verbatim() {
        let reply = vec![0xffu8, 0x00].into_reply();
        assert!(matches!(reply, Reply::Body(b) if b[..] == [0xffu8, 0x00]));
    }

    #[test]
    fn test_status_tuples() {
        let reply = (StatusCode::CREATED, "made").into_reply();
        assert!(matches!(reply, Reply::Status(s, b) if s == StatusCode::CREATED && b == "made"));

        let reply = (418u16, "teapot").into_reply();
        assert!(matches!(reply, Reply::Status(s, _) if s.as_u16() == 418));

        let reply = (404_i32, "missing").into_reply();
        assert!(matches!(reply, Reply::Status(s, _) if s == StatusCode::NOT_FOUND));

        assert!(matches!((42u16, "bogus").into_reply(), Reply::Error(_)));
        assert!(matches!((-1_i32, "negative").into_reply(), Reply::Error(_)));
    }

    #[test]
    fn test_result_errors_become_error_replies() {
        let ok: Result<&str, std::io::Error> = Ok("fine");
        assert!(matches!(ok.into_reply(), Reply::Body(_)));

        let err: Result<&str, anyhow::Error> = Err(anyhow::anyhow!("boom"));
        match err.into_reply() {
            Reply::Error(e) => assert_eq!(e.to_string(), "boom"),
            other => panic!("expected error reply, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_text_uses_display() {
        assert!(matches!(Reply::text(42), Reply::Body(b) if b == "42"));
    }
}
