//! Request dispatch.
//!
//! [`Router`] owns everything needed to answer a request: the process-wide
//! [`Container`], the global middleware, the per-method route trees, the
//! terminal action and the Not-Found chain. Setup happens through `&mut
//! self` methods; once built the router is shared read-only (typically in
//! an `Arc`) and [`Router::serve`] may run on any number of threads.
//!
//! # Dispatch
//!
//! ```text
//! (method, path) ──► route table / tree ──► middleware ++ route handlers ++ action
//!                          │
//!                          └─ miss ───────► middleware ++ Not-Found chain
//! ```
//!
//! Every handler is validated against the container when it is
//! registered, so a missing service is reported at setup time.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use waymark_core::{
    validate_chain, ChainScope, Container, Context, ErrorChain, Handler, Logger, ResponseWriter, ReturnHandler,
};
use waymark_router::{Leaf, Router as RouteTrees};

use crate::error::ServerError;

/// The handlers registered for one route.
pub type HandlerChain = Arc<[Handler]>;

/// What the route trees store for each route.
#[derive(Clone)]
pub struct RouteEntry {
    pattern: Arc<str>,
    handlers: HandlerChain,
}

impl RouteEntry {
    /// Returns the full pattern as first registered.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the route's own handlers.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Something that turns a buffered request into a buffered response.
///
/// The listener serves any `Dispatch` implementation; [`Router`] is the
/// basic one.
pub trait Dispatch: Send + Sync + 'static {
    /// Answers one request.
    fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes>;
}

/// A registered route.
///
/// Registering the same method and pattern again returns a handle to the
/// same route.
#[derive(Clone)]
pub struct RouteHandle {
    leaf: Arc<Leaf<RouteEntry>>,
}

impl RouteHandle {
    /// Returns the full pattern of the route, as passed to the
    /// registration that created it.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.leaf.value().pattern()
    }

    /// Returns the route's own handlers, without global middleware.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        self.leaf.value().handlers()
    }

    /// Returns true if the route's last segment is optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.leaf.is_optional()
    }
}

impl PartialEq for RouteHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.leaf, &other.leaf)
    }
}

impl Eq for RouteHandle {}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandle")
            .field("pattern", &self.pattern())
            .field("handlers", &self.handlers().len())
            .finish()
    }
}

/// The request dispatcher.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use http::{Request, StatusCode};
/// use waymark_core::Handler;
/// use waymark_server::Router;
///
/// let mut router = Router::new();
/// router
///     .get("/users/:id([0-9]+)", [Handler::new(|ctx| format!("user {}", ctx.param("id").unwrap_or("?")))])
///     .unwrap();
///
/// let response = router.handle(Request::get("/users/42").body(Bytes::new()).unwrap());
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.body().as_ref(), b"user 42");
///
/// let missing = router.handle(Request::get("/users/abc").body(Bytes::new()).unwrap());
/// assert_eq!(missing.status(), StatusCode::NOT_FOUND);
/// ```
pub struct Router {
    container: Arc<Container>,
    middleware: Vec<Handler>,
    action: Option<Handler>,
    routes: RouteTrees<RouteEntry>,
    not_found: Option<HandlerChain>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a router whose container holds the default [`Logger`] and
    /// [`ReturnHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_container(Container::new())
    }

    /// Creates a router around an existing process container.
    ///
    /// A [`Logger`] and a [`ReturnHandler`] are added if missing.
    #[must_use]
    pub fn with_container(mut container: Container) -> Self {
        if !container.contains::<Logger>() {
            container.register(Arc::new(Logger::default()));
        }
        if !container.contains::<ReturnHandler>() {
            container.register(Arc::new(ReturnHandler::default()));
        }
        Self {
            container: Arc::new(container),
            middleware: Vec::new(),
            action: None,
            routes: RouteTrees::new(),
            not_found: None,
        }
    }

    /// Returns the process-wide container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Binds a process-wide service.
    ///
    /// Register services before the handlers that declare them.
    pub fn map<T: Send + Sync + 'static>(&mut self, service: T) {
        self.map_arc(Arc::new(service));
    }

    /// Binds an already shared process-wide service.
    pub fn map_arc<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        Arc::make_mut(&mut self.container).register(service);
    }

    /// Replaces the conversion of handler replies into responses.
    pub fn set_return_handler(&mut self, handler: ReturnHandler) {
        self.map(handler);
    }

    /// Appends a global middleware, run before every route's handlers and
    /// before the Not-Found chain.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Injection`] if the handler declares an input
    /// the container cannot provide.
    pub fn use_middleware(&mut self, handler: Handler) -> Result<(), ServerError> {
        handler.validate(&self.container, ChainScope::Request)?;
        self.middleware.push(handler);
        Ok(())
    }

    /// Returns the global middleware.
    #[must_use]
    pub fn middleware(&self) -> &[Handler] {
        &self.middleware
    }

    /// Sets the terminal action, run once after a route's handlers when
    /// none of them wrote a response.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Injection`] if the handler declares an input
    /// the container cannot provide.
    pub fn set_action(&mut self, handler: Handler) -> Result<(), ServerError> {
        handler.validate(&self.container, ChainScope::Request)?;
        self.action = Some(handler);
        Ok(())
    }

    /// Registers a route.
    ///
    /// `method` is `GET`, `POST` (any case) or `*` for both. Registering an
    /// existing method and pattern returns the existing route and leaves
    /// its handlers unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Route`] for an unknown method or an invalid
    /// pattern and [`ServerError::Injection`] for an unresolvable handler
    /// input. Nothing is registered on error.
    pub fn register<I>(&mut self, method: &str, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        validate_chain(&handlers, &self.container, ChainScope::Request)?;

        let entry = RouteEntry {
            pattern: Arc::from(pattern),
            handlers: Arc::from(handlers),
        };
        let leaf = self.routes.insert(method, pattern, entry)?;
        Ok(RouteHandle { leaf })
    }

    /// Registers a `GET` route.
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn get<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.register("GET", pattern, handlers)
    }

    /// Registers a `POST` route.
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn post<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.register("POST", pattern, handlers)
    }

    /// Registers a route for every supported method.
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn any<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.register("*", pattern, handlers)
    }

    /// Replaces the Not-Found chain.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Injection`] for an unresolvable handler input.
    pub fn not_found<I>(&mut self, handlers: I) -> Result<(), ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        validate_chain(&handlers, &self.container, ChainScope::Request)?;
        self.not_found = Some(Arc::from(handlers));
        Ok(())
    }

    /// Replaces the error chain, run when a handler returns an error.
    ///
    /// Error handlers may declare the [`HandlerError`](waymark_core::HandlerError)
    /// being handled as an input.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Injection`] for an unresolvable handler input.
    pub fn internal_server_error<I>(&mut self, handlers: I) -> Result<(), ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        validate_chain(&handlers, &self.container, ChainScope::Error)?;
        self.map(ErrorChain::new(handlers));
        Ok(())
    }

    /// Returns the route trees.
    #[must_use]
    pub fn routes(&self) -> &RouteTrees<RouteEntry> {
        &self.routes
    }

    /// Runs the matching chain for `request`, writing into `response`.
    pub fn serve(&self, request: Request<Bytes>, response: ResponseWriter) -> ResponseWriter {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let ctx = Context::with_response(request, response, Arc::clone(&self.container));
        let mut ctx = match self.routes.match_route(&method, &path) {
            Some(found) => {
                tracing::debug!(%method, %path, route = found.value().pattern(), "route matched");
                let chain = self.chain_with(found.value().handlers());
                ctx.params_from(found.params).chain(chain, self.action.clone())
            }
            None => {
                tracing::debug!(%method, %path, "no route matched");
                let chain = match &self.not_found {
                    Some(handlers) => self.chain_with(handlers),
                    None => self.chain_with(&[default_not_found()]),
                };
                ctx.chain(chain, None)
            }
        };

        ctx.run();
        ctx.into_response()
    }

    /// Serves `request` with a fresh response sink.
    pub fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let response = ResponseWriter::new(request.method().clone());
        self.serve(request, response).into_response()
    }

    fn chain_with(&self, handlers: &[Handler]) -> Vec<Handler> {
        let mut chain = Vec::with_capacity(self.middleware.len() + handlers.len());
        chain.extend_from_slice(&self.middleware);
        chain.extend_from_slice(handlers);
        chain
    }
}

impl Dispatch for Router {
    fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.handle(request)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("container", &self.container)
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes.len())
            .field("has_action", &self.action.is_some())
            .field("custom_not_found", &self.not_found.is_some())
            .finish()
    }
}

fn default_not_found() -> Handler {
    Handler::raw(|_, response| {
        response.set_content_type_if_absent("text/plain; charset=utf-8");
        response.write_header(StatusCode::NOT_FOUND);
        response.write("404 page not found");
    })
}
