//! Per-request context and the dispatch cursor.
//!
//! A [`Context`] owns everything one request needs while its handler chain
//! runs: the request, the response sink, the captured route parameters, a
//! request-scoped [`Container`] whose parent is the process container, and
//! the chain itself with a cursor into it.
//!
//! The chain is the global middleware followed by the route handlers,
//! followed by the terminal action. [`Context::run`] walks it once; a
//! middleware that calls [`Context::next`] runs the remainder of the chain
//! synchronously and then continues with its own code. Iteration stops as
//! soon as the response status has been written.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, StatusCode};
use waymark_router::Params;

use crate::di::Container;
use crate::error::HandlerError;
use crate::handler::Handler;
use crate::reply::ReturnHandler;
use crate::response::ResponseWriter;

/// Named logging handle bound in the process container.
///
/// Events are emitted through `tracing` with the logger name as a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    /// Creates a logger with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs at debug level.
    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(logger = %self.name, "{message}");
    }

    /// Logs at info level.
    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(logger = %self.name, "{message}");
    }

    /// Logs at warn level.
    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(logger = %self.name, "{message}");
    }

    /// Logs at error level.
    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(logger = %self.name, "{message}");
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("waymark")
    }
}

/// Socket address of the connected peer, attached to requests as an
/// extension by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// The handlers run when a handler returns an error.
///
/// Bound in the process container; when absent, a `500` carrying the error
/// message is written.
#[derive(Debug, Clone)]
pub struct ErrorChain(Arc<[Handler]>);

impl ErrorChain {
    /// Creates an error chain.
    #[must_use]
    pub fn new(handlers: impl Into<Arc<[Handler]>>) -> Self {
        Self(handlers.into())
    }

    /// Returns the handlers.
    #[must_use]
    pub fn handlers(&self) -> &Arc<[Handler]> {
        &self.0
    }
}

/// Per-request state flowing through the handler chain.
pub struct Context {
    request: Request<Bytes>,
    response: ResponseWriter,
    params: Params,
    container: Container,
    handlers: Arc<[Handler]>,
    action: Option<Handler>,
    index: usize,
    halted: bool,
    handling_error: bool,
}

impl Context {
    /// Creates a context for `request` with a fresh response sink.
    #[must_use]
    pub fn new(request: Request<Bytes>, process: Arc<Container>) -> Self {
        let response = ResponseWriter::new(request.method().clone());
        Self::with_response(request, response, process)
    }

    /// Creates a context writing into an existing response sink.
    #[must_use]
    pub fn with_response(request: Request<Bytes>, response: ResponseWriter, process: Arc<Container>) -> Self {
        Self {
            request,
            response,
            params: Params::new(),
            container: Container::child(process),
            handlers: Arc::from(Vec::new()),
            action: None,
            index: 0,
            halted: false,
            handling_error: false,
        }
    }

    /// Sets the captured route parameters.
    #[must_use]
    pub fn params_from(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the chain to run and the terminal action that follows it.
    #[must_use]
    pub fn chain(mut self, handlers: impl Into<Arc<[Handler]>>, action: Option<Handler>) -> Self {
        self.handlers = handlers.into();
        self.action = action;
        self.index = 0;
        self
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Returns the request for modification.
    pub fn request_mut(&mut self) -> &mut Request<Bytes> {
        &mut self.request
    }

    /// Returns the response sink.
    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// Returns the response sink for writing.
    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub(crate) fn split_raw(&mut self) -> (&Request<Bytes>, &mut ResponseWriter) {
        (&self.request, &mut self.response)
    }

    /// Returns every captured route parameter.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns one route parameter; `id` and `:id` are equivalent.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.params.param(name)
    }

    /// Returns the request-scoped container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Binds a value for the rest of this request, shadowing any process
    /// binding of the same type.
    pub fn map<T: Send + Sync + 'static>(&mut self, value: T) {
        self.container.register(Arc::new(value));
    }

    /// Resolves a value from the request container or the process
    /// container.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.container.resolve()
    }

    /// Returns true once the response status has been written.
    #[must_use]
    pub fn written(&self) -> bool {
        self.response.written()
    }

    /// Returns the client address.
    ///
    /// `X-Real-IP` wins over `X-Forwarded-For`, which wins over the peer
    /// socket address (without its port).
    #[must_use]
    pub fn remote_addr(&self) -> Option<String> {
        let header = |name: &str| {
            self.request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        header("x-real-ip")
            .or_else(|| header("x-forwarded-for"))
            .or_else(|| {
                self.request
                    .extensions()
                    .get::<PeerAddr>()
                    .map(|peer| peer.0.ip().to_string())
            })
    }

    /// Runs the remainder of the chain, then returns to the caller.
    pub fn next(&mut self) {
        self.run();
    }

    /// Runs the chain from the cursor until the response is written, the
    /// chain is exhausted or an error halts processing.
    pub fn run(&mut self) {
        while !self.halted && self.index <= self.handlers.len() {
            let handler = match self.handlers.get(self.index) {
                Some(handler) => handler.clone(),
                None => match self.action.clone() {
                    Some(action) => action,
                    None => {
                        self.index += 1;
                        break;
                    }
                },
            };
            self.index += 1;

            let reply = handler.call(self);
            if !reply.is_empty() {
                let converter = self.get::<ReturnHandler>().map_or_else(ReturnHandler::default, |r| (*r).clone());
                converter.handle(self, reply);
            }

            if self.halted || self.response.written() {
                return;
            }
        }
    }

    /// Hands `err` to the error chain and stops normal processing.
    ///
    /// The error is bound as [`HandlerError`] in the request container, the
    /// error chain replaces the remaining handlers and runs from its start.
    pub fn fail(&mut self, err: anyhow::Error) {
        if self.handling_error {
            tracing::error!(error = %err, "error handler returned an error");
            self.halted = true;
            return;
        }
        tracing::error!(error = %err, path = %self.request.uri().path(), "handler returned an error");

        let chain = self.get::<ErrorChain>();
        self.map(HandlerError::from(err));

        match chain {
            Some(chain) => {
                self.handling_error = true;
                self.halted = false;
                self.handlers = Arc::clone(chain.handlers());
                self.action = None;
                self.index = 0;
                self.run();
            }
            None => self.write_default_error(),
        }
        self.halted = true;
    }

    fn write_default_error(&mut self) {
        let message = self
            .get::<HandlerError>()
            .map(|err| err.to_string())
            .unwrap_or_default();
        self.response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        self.response.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        self.response.write(message);
    }

    /// Returns true if an error stopped normal processing.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Consumes the context and returns the response sink.
    #[must_use]
    pub fn into_response(self) -> ResponseWriter {
        self.response
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("params", &self.params)
            .field("handlers", &self.handlers.len())
            .field("index", &self.index)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Reply;
    use std::sync::Mutex;

    fn request(path: &str) -> Request<Bytes> {
        Request::builder().uri(path).body(Bytes::new()).unwrap()
    }

    fn context(handlers: Vec<Handler>) -> Context {
        Context::new(request("/"), Arc::new(Container::new())).chain(handlers, None)
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &'static str| {
                let log = Arc::clone(&log);
                Handler::new(move |_| log.lock().unwrap().push(name))
            }
        };
        (log, make)
    }

    #[test]
    fn test_runs_every_handler_in_order() {
        let (log, step) = recorder();
        let mut ctx = context(vec![step("a"), step("b"), step("c")]);
        ctx.run();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_writer_wins() {
        let (log, step) = recorder();
        let writer = {
            let log = Arc::clone(&log);
            Handler::new(move |_| {
                log.lock().unwrap().push("a");
                "done"
            })
        };
        let mut ctx = context(vec![writer, step("b"), step("c")]);
        ctx.run();

        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(ctx.response().body(), b"done");
    }

    #[test]
    fn test_next_resumes_after_rest_of_chain() {
        let (log, step) = recorder();
        let around = {
            let log = Arc::clone(&log);
            Handler::new(move |ctx| {
                log.lock().unwrap().push("before");
                ctx.next();
                log.lock().unwrap().push("after");
            })
        };
        let mut ctx = context(vec![around, step("inner")]);
        ctx.run();
        assert_eq!(*log.lock().unwrap(), vec!["before", "inner", "after"]);
    }

    #[test]
    fn test_action_runs_once_at_end() {
        let (log, step) = recorder();
        let mut ctx = Context::new(request("/"), Arc::new(Container::new()))
            .chain(vec![step("a"), step("b")], Some(step("action")));
        ctx.run();
        ctx.run();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "action"]);
    }

    #[test]
    fn test_action_runs_after_next() {
        let (log, step) = recorder();
        let around = Handler::new(|ctx| ctx.next());
        let mut ctx = Context::new(request("/"), Arc::new(Container::new()))
            .chain(vec![around, step("a")], Some(step("action")));
        ctx.run();
        assert_eq!(*log.lock().unwrap(), vec!["a", "action"]);
    }

    #[test]
    fn test_error_reply_uses_default_error_response() {
        let (log, step) = recorder();
        let failing = Handler::new(|_| Err::<(), _>(anyhow::anyhow!("boom")));
        let mut ctx = context(vec![failing, step("after")]);
        ctx.run();

        assert!(ctx.halted());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(ctx.response().body(), b"boom");
    }

    #[test]
    fn test_error_chain_receives_error() {
        let mut process = Container::new();
        process.register(Arc::new(ErrorChain::new(vec![Handler::on_error(|_, err| {
            (StatusCode::BAD_GATEWAY, format!("upstream: {err}"))
        })])));

        let failing = Handler::new(|_| Err::<(), _>(anyhow::anyhow!("timeout")));
        let mut ctx = Context::new(request("/"), Arc::new(process)).chain(vec![failing], None);
        ctx.run();

        assert_eq!(ctx.response().status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(ctx.response().body(), b"upstream: timeout");
    }

    #[test]
    fn test_failing_error_chain_does_not_recurse() {
        let mut process = Container::new();
        process.register(Arc::new(ErrorChain::new(vec![Handler::on_error(|_, _| {
            Err::<(), _>(anyhow::anyhow!("error handler broke"))
        })])));

        let failing = Handler::new(|_| Err::<(), _>(anyhow::anyhow!("first")));
        let mut ctx = Context::new(request("/"), Arc::new(process)).chain(vec![failing], None);
        ctx.run();

        assert!(ctx.halted());
        assert!(!ctx.written());
    }

    #[test]
    fn test_error_inside_next_stops_outer_middleware_chain() {
        let (log, step) = recorder();
        let around = Handler::new(|ctx| ctx.next());
        let failing = Handler::new(|_| Reply::Error(anyhow::anyhow!("nope")));
        let mut ctx = context(vec![around, failing, step("unreached")]);
        ctx.run();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(ctx.response().status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_custom_return_handler() {
        let mut process = Container::new();
        process.register(Arc::new(ReturnHandler::new(|ctx, reply| {
            if let Reply::Body(body) = reply {
                let shouted = String::from_utf8_lossy(&body).to_uppercase();
                ctx.response_mut().write(shouted);
            }
        })));

        let mut ctx = Context::new(request("/"), Arc::new(process)).chain(vec![Handler::new(|_| "quiet")], None);
        ctx.run();
        assert_eq!(ctx.response().body(), b"QUIET");
    }

    #[test]
    fn test_map_shadows_process_value() {
        let mut process = Container::new();
        process.register(Arc::new(Logger::new("process")));

        let mut ctx = Context::new(request("/"), Arc::new(process));
        assert_eq!(ctx.get::<Logger>().unwrap().name(), "process");

        ctx.map(Logger::new("request"));
        assert_eq!(ctx.get::<Logger>().unwrap().name(), "request");
    }

    #[test]
    fn test_param_lookup() {
        let mut params = Params::new();
        params.set(":id", "7");
        params.set("*", "rest");
        let ctx = Context::new(request("/"), Arc::new(Container::new())).params_from(params);

        assert_eq!(ctx.param("id"), Some("7"));
        assert_eq!(ctx.param(":id"), Some("7"));
        assert_eq!(ctx.param("*"), Some("rest"));
        assert_eq!(ctx.param(""), None);
    }

    #[test]
    fn test_remote_addr_precedence() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        let mut req = request("/");
        req.extensions_mut().insert(PeerAddr(peer));
        let ctx = Context::new(req, Arc::new(Container::new()));
        assert_eq!(ctx.remote_addr().as_deref(), Some("10.0.0.9"));

        let mut req = request("/");
        req.extensions_mut().insert(PeerAddr(peer));
        req.headers_mut().insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        let ctx = Context::new(req, Arc::new(Container::new()));
        assert_eq!(ctx.remote_addr().as_deref(), Some("1.2.3.4"));

        let mut req = request("/");
        req.headers_mut().insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        req.headers_mut().insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        let ctx = Context::new(req, Arc::new(Container::new()));
        assert_eq!(ctx.remote_addr().as_deref(), Some("5.6.7.8"));
    }

    #[test]
    fn test_raw_handler_writes_response() {
        let raw = Handler::raw(|req, rw| {
            rw.write_header(StatusCode::ACCEPTED);
            rw.write(req.uri().path().to_string());
        });
        let mut ctx = Context::new(request("/raw"), Arc::new(Container::new())).chain(vec![raw], None);
        ctx.run();

        let response = ctx.into_response();
        assert_eq!(response.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(response.body(), b"/raw");
    }
}
