//! HTTP/1.1 listener.
//!
//! The listener accepts TCP connections with Tokio, serves them with
//! Hyper, buffers each request body and hands the request to a
//! [`Dispatch`] implementation on Tokio's blocking pool. Handler chains are
//! synchronous, so they never run on a runtime worker thread.
//!
//! ```rust,no_run
//! use waymark_config::ServerConfig;
//! use waymark_core::Handler;
//! use waymark_server::{Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.get("/", [Handler::new(|_| "hello")])?;
//!
//!     Server::new(router, ServerConfig::default()).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use waymark_config::ServerConfig;
use waymark_core::PeerAddr;

use crate::error::ServerError;
use crate::router::Dispatch;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response body type produced by the listener.
pub type ResponseBody = Full<Bytes>;

/// A listener serving one dispatcher.
pub struct Server<D> {
    dispatcher: Arc<D>,
    config: ServerConfig,
}

impl<D: Dispatch> Server<D> {
    /// Creates a server for `dispatcher`.
    pub fn new(dispatcher: D, config: ServerConfig) -> Self {
        Self::from_arc(Arc::new(dispatcher), config)
    }

    /// Creates a server for an already shared dispatcher.
    pub fn from_arc(dispatcher: Arc<D>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Returns the dispatcher.
    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Returns the listener settings.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        self.serve_listener(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then waits up to the shutdown timeout for open connections.
    pub async fn serve_listener(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "listening");

        let tracker = ConnectionTracker::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let token = tracker.acquire();
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(dispatcher, stream, peer, shutdown).await {
                                tracing::debug!(%peer, error = %err, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(err) => tracing::error!(error = %err, "failed to accept connection"),
                },
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        tokio::select! {
            _ = tracker.wait_idle() => tracing::info!("all connections closed"),
            _ = tokio::time::sleep(grace) => tracing::warn!(
                remaining = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn serve_connection<D: Dispatch>(
    dispatcher: Arc<D>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |request: Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(handle_request(dispatcher, request, peer).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

async fn handle_request<D: Dispatch>(
    dispatcher: Arc<D>,
    request: Request<Incoming>,
    peer: SocketAddr,
) -> Response<ResponseBody> {
    let (mut parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::warn!(%peer, error = %err, "failed to read request body");
            return plain(StatusCode::BAD_REQUEST, "failed to read request body");
        }
    };

    parts.extensions.insert(PeerAddr(peer));
    let request = Request::from_parts(parts, body);

    match tokio::task::spawn_blocking(move || dispatcher.dispatch(request)).await {
        Ok(response) => response.map(Full::new),
        Err(err) => {
            tracing::error!(%peer, error = %err, "dispatch task failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
