//! Buffered response sink.
//!
//! [`ResponseWriter`] collects the status, headers and body a handler chain
//! produces. The status can be written once; the dispatch loop stops as
//! soon as [`ResponseWriter::written`] reports true.

use std::fmt;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Method, Response, StatusCode};

/// Hook run just before the status is committed.
pub type BeforeHook = Box<dyn FnOnce(&mut ResponseWriter) + Send>;

/// Response sink shared by every handler of one request.
///
/// # Example
///
/// ```rust
/// use waymark_core::ResponseWriter;
/// use http::{Method, StatusCode};
///
/// let mut rw = ResponseWriter::new(Method::GET);
/// assert!(!rw.written());
///
/// rw.write(b"hello");
/// assert_eq!(rw.status(), Some(StatusCode::OK));
/// assert_eq!(rw.size(), 5);
///
/// rw.write_header(StatusCode::NOT_FOUND);
/// assert_eq!(rw.status(), Some(StatusCode::OK));
/// ```
pub struct ResponseWriter {
    method: Method,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    size: usize,
    before: Vec<BeforeHook>,
}

impl ResponseWriter {
    /// Creates a writer for a request made with `method`.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            status: None,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            size: 0,
            before: Vec::new(),
        }
    }

    /// Writes the status.
    ///
    /// Before-hooks run in reverse registration order first. Only the first
    /// status written is kept; later calls are logged and ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(%current, ignored = %status, "response status already written");
            return;
        }

        let hooks = std::mem::take(&mut self.before);
        for hook in hooks.into_iter().rev() {
            hook(self);
        }

        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Appends to the body, writing `200 OK` first if no status is set.
    ///
    /// Bodies of `HEAD` responses are discarded. Returns the number of
    /// bytes kept.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> usize {
        if !self.written() {
            self.write_header(StatusCode::OK);
        }
        if self.method == Method::HEAD {
            return 0;
        }

        let data = data.as_ref();
        self.body.extend_from_slice(data);
        self.size += data.len();
        data.len()
    }

    /// Registers a hook to run before the status is committed.
    pub fn before(&mut self, hook: impl FnOnce(&mut ResponseWriter) + Send + 'static) {
        self.before.push(Box::new(hook));
    }

    /// Returns true once a status has been written.
    #[must_use]
    pub fn written(&self) -> bool {
        self.status.is_some()
    }

    /// Returns the written status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the cumulative number of body bytes written.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the method of the request being answered.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets `Content-Type` unless one is already present.
    pub fn set_content_type_if_absent(&mut self, value: &'static str) {
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(value));
    }

    /// Builds the final response. An unwritten status becomes `200 OK`.
    #[must_use]
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("method", &self.method)
            .field("status", &self.status)
            .field("size", &self.size)
            .field("before_hooks", &self.before.len())
            .finish_non_exhaustive()
    }
}
