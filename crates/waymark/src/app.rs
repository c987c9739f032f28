//! The `Waymark` application.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::uri::PathAndQuery;
use http::{Request, Response, Uri};
use waymark_config::{ConfigLoader, Environment, WaymarkConfig};
use waymark_core::{Container, Handler, ResponseWriter, ReturnHandler};
use waymark_middleware::{logger, recovery};
use waymark_server::{Dispatch, RouteHandle, Router, Server, ServerError};

use crate::error::WaymarkError;

/// A hook run before routing.
///
/// Returning `true` marks the request as handled; routing and every
/// later hook are skipped.
pub type BeforeHandler = Arc<dyn Fn(&mut Request<Bytes>, &mut ResponseWriter) -> bool + Send + Sync>;

/// A Waymark application: a [`Router`] plus before-hooks and an optional
/// URL prefix.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use http::{Request, StatusCode};
/// use waymark::prelude::*;
///
/// # fn main() -> Result<(), ServerError> {
/// let mut app = Waymark::classic();
/// app.get("/hello/:name", [Handler::new(|ctx| format!("hello {}", ctx.param("name").unwrap_or("")))])?;
///
/// let response = app.handle(Request::get("/hello/grace").body(Bytes::new()).unwrap());
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.body().as_ref(), b"hello grace");
/// # Ok(())
/// # }
/// ```
pub struct Waymark {
    router: Router,
    befores: Vec<BeforeHandler>,
    url_prefix: Option<String>,
}

impl Default for Waymark {
    fn default() -> Self {
        Self::new()
    }
}

impl Waymark {
    /// Creates an application with no middleware.
    ///
    /// The container starts with the default logger and return handler,
    /// Not-Found answers `404 page not found` and handler errors answer
    /// `500` with the error message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            befores: Vec::new(),
            url_prefix: None,
        }
    }

    /// Creates an application with request logging and panic recovery.
    #[must_use]
    pub fn classic() -> Self {
        let mut app = Self::new();
        for handler in [logger(), recovery()] {
            // Both only need the logger `new` binds.
            if let Err(err) = app.use_middleware(handler) {
                tracing::error!(error = %err, "built-in middleware rejected");
            }
        }
        app
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the router for direct setup.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Returns the process-wide container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        self.router.container()
    }

    /// Binds a process-wide service that handlers may declare as input.
    pub fn map<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.router.map(service);
        self
    }

    /// Binds the deployment environment.
    pub fn set_env(&mut self, env: Environment) -> &mut Self {
        self.map(env)
    }

    /// Returns the bound environment, `development` if none is bound.
    #[must_use]
    pub fn env(&self) -> Environment {
        self.container()
            .resolve::<Environment>()
            .map(|env| *env)
            .unwrap_or_default()
    }

    /// Replaces the conversion of handler replies into responses.
    pub fn set_return_handler(&mut self, handler: ReturnHandler) -> &mut Self {
        self.router.set_return_handler(handler);
        self
    }

    /// Appends a global middleware.
    pub fn use_middleware(&mut self, handler: Handler) -> Result<&mut Self, ServerError> {
        self.router.use_middleware(handler)?;
        Ok(self)
    }

    /// Appends a before-hook.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Request<Bytes>, &mut ResponseWriter) -> bool + Send + Sync + 'static,
    {
        self.befores.push(Arc::new(hook));
        self
    }

    /// Sets the terminal action.
    pub fn action(&mut self, handler: Handler) -> Result<&mut Self, ServerError> {
        self.router.set_action(handler)?;
        Ok(self)
    }

    /// Replaces the Not-Found chain.
    pub fn not_found<I>(&mut self, handlers: I) -> Result<&mut Self, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.not_found(handlers)?;
        Ok(self)
    }

    /// Replaces the error chain.
    pub fn internal_server_error<I>(&mut self, handlers: I) -> Result<&mut Self, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.internal_server_error(handlers)?;
        Ok(self)
    }

    /// Registers a route; `method` is `GET`, `POST` or `*`.
    pub fn register<I>(&mut self, method: &str, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.register(method, pattern, handlers)
    }

    /// Registers a `GET` route.
    pub fn get<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.get(pattern, handlers)
    }

    /// Registers a `POST` route.
    pub fn post<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.post(pattern, handlers)
    }

    /// Registers a route for every supported method.
    pub fn any<I>(&mut self, pattern: &str, handlers: I) -> Result<RouteHandle, ServerError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.router.any(pattern, handlers)
    }

    /// Mounts the application under `prefix`.
    ///
    /// The prefix is stripped from matching request paths before the
    /// before-hooks run. `""` and `"/"` unmount it; a missing leading `/`
    /// is added and trailing ones are dropped.
    pub fn set_url_prefix(&mut self, prefix: &str) -> &mut Self {
        let trimmed = prefix.trim_end_matches('/');
        self.url_prefix = match trimmed {
            "" => None,
            p if p.starts_with('/') => Some(p.to_string()),
            p => Some(format!("/{p}")),
        };
        self
    }

    /// Returns the mount prefix, if any.
    #[must_use]
    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    /// Runs the before-hooks and then the router.
    pub fn serve(&self, mut request: Request<Bytes>, mut response: ResponseWriter) -> ResponseWriter {
        self.strip_prefix(&mut request);

        for hook in &self.befores {
            if hook(&mut request, &mut response) {
                tracing::debug!(path = %request.uri().path(), "request handled by before-hook");
                return response;
            }
        }

        self.router.serve(request, response)
    }

    /// Serves `request` with a fresh response sink.
    pub fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let response = ResponseWriter::new(request.method().clone());
        self.serve(request, response).into_response()
    }

    /// Turns the application into a listener for `config`.
    ///
    /// Binds `config.env` and mounts `config.server.url_prefix` unless a
    /// prefix was set explicitly.
    pub fn into_server(mut self, config: &WaymarkConfig) -> Server<Self> {
        self.set_env(config.env);
        if self.url_prefix.is_none() && !config.server.url_prefix.is_empty() {
            self.set_url_prefix(&config.server.url_prefix);
        }
        Server::new(self, config.server.clone())
    }

    /// Installs logging, then serves on `config.server` until SIGINT or
    /// SIGTERM.
    pub async fn run(self, config: WaymarkConfig) -> Result<(), ServerError> {
        if let Err(err) = waymark_telemetry::init_logging(&config.logging.to_log_config()) {
            tracing::warn!(error = %err, "logging not initialised");
        }
        tracing::info!(addr = %config.server.bind_addr(), env = %config.env, "starting waymark");
        self.into_server(&config).run().await
    }

    /// Runs with configuration from `.env`, `HOST` / `PORT` and
    /// `WAYMARK__SECTION__KEY` variables on top of the defaults.
    pub async fn run_from_env(self) -> Result<(), WaymarkError> {
        let config = ConfigLoader::new()
            .with_dotenv()?
            .with_listen_env()
            .with_env_prefix("WAYMARK")
            .load()?;
        self.run(config).await?;
        Ok(())
    }

    fn strip_prefix(&self, request: &mut Request<Bytes>) {
        let Some(prefix) = self.url_prefix.as_deref() else {
            return;
        };
        let Some(rest) = request.uri().path().strip_prefix(prefix) else {
            return;
        };
        // Only strip at a segment boundary: "/api" must not eat "/apix".
        if !rest.is_empty() && !rest.starts_with('/') {
            return;
        }

        let path = if rest.is_empty() { "/" } else { rest };
        let rebuilt = match request.uri().query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };

        let mut parts = request.uri().clone().into_parts();
        match PathAndQuery::try_from(rebuilt) {
            Ok(path_and_query) => parts.path_and_query = Some(path_and_query),
            Err(err) => {
                tracing::warn!(error = %err, "could not strip url prefix");
                return;
            }
        }
        match Uri::from_parts(parts) {
            Ok(uri) => *request.uri_mut() = uri,
            Err(err) => tracing::warn!(error = %err, "could not strip url prefix"),
        }
    }
}

impl Dispatch for Waymark {
    fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.handle(request)
    }
}

impl fmt::Debug for Waymark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waymark")
            .field("router", &self.router)
            .field("befores", &self.befores.len())
            .field("url_prefix", &self.url_prefix)
            .finish()
    }
}
