//! Handler variants.
//!
//! A [`Handler`] is one step of a request's handler chain. Instead of
//! accepting arbitrary function shapes, each handler is built from one of a
//! closed set of signatures; the inputs a signature needs beyond the
//! context itself are recorded as [`Dependency`] values and checked against
//! the process container when the handler is registered.
//!
//! | Constructor | Signature | Extra inputs |
//! |-------------|-----------|--------------|
//! | [`Handler::new`] | `Fn(&mut Context) -> R` | none |
//! | [`Handler::with_logger`] | `Fn(&mut Context, &Logger) -> R` | [`Logger`] |
//! | [`Handler::raw`] | `Fn(&Request<Bytes>, &mut ResponseWriter) -> R` | none |
//! | [`Handler::on_error`] | `Fn(&mut Context, &HandlerError) -> R` | [`HandlerError`] |
//! | [`Handler::inject`] | `Fn(&mut Context, &S) -> R` | `S` |
//!
//! `R` is anything implementing [`IntoReply`].

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::Request;

use crate::context::{Context, Logger};
use crate::di::Container;
use crate::error::{HandlerError, InjectionError};
use crate::reply::{IntoReply, Reply};
use crate::response::ResponseWriter;

/// The signature a handler was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Takes the context only.
    Context,
    /// Takes the context and the process logger.
    Logger,
    /// Takes the raw request and the response sink.
    Raw,
    /// Takes the context and the error being handled.
    Error,
    /// Takes the context and a service from the container.
    Inject,
}

/// Which chain a handler is being registered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainScope {
    /// Global middleware, route handlers, Not-Found handlers, the action.
    Request,
    /// The error chain, where [`HandlerError`] is bound.
    Error,
}

/// A declared handler input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
}

impl Dependency {
    /// The dependency on a value of type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type name, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

type HandlerFn = dyn Fn(&mut Context) -> Reply + Send + Sync;

/// One step of a handler chain.
///
/// Cloning is cheap; clones share the underlying function.
#[derive(Clone)]
pub struct Handler {
    kind: HandlerKind,
    dependency: Option<Dependency>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// A handler that takes only the context.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waymark_core::Handler;
    ///
    /// let hello = Handler::new(|ctx| format!("hello {}", ctx.param("name").unwrap_or("world")));
    /// # let _ = hello;
    /// ```
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            kind: HandlerKind::Context,
            dependency: None,
            func: Arc::new(move |ctx| f(ctx).into_reply()),
        }
    }

    /// A handler that also receives the process [`Logger`].
    pub fn with_logger<F, R>(f: F) -> Self
    where
        F: Fn(&mut Context, &Logger) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            kind: HandlerKind::Logger,
            dependency: Some(Dependency::of::<Logger>()),
            func: Arc::new(move |ctx| match ctx.get::<Logger>() {
                Some(logger) => f(ctx, &logger).into_reply(),
                None => Reply::Error(InjectionError::not_registered::<Logger>().into()),
            }),
        }
    }

    /// A handler that works on the raw request and response sink.
    pub fn raw<F, R>(f: F) -> Self
    where
        F: Fn(&Request<Bytes>, &mut ResponseWriter) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            kind: HandlerKind::Raw,
            dependency: None,
            func: Arc::new(move |ctx| {
                let (request, response) = ctx.split_raw();
                f(request, response).into_reply()
            }),
        }
    }

    /// A handler for the error chain, receiving the error being handled.
    pub fn on_error<F, R>(f: F) -> Self
    where
        F: Fn(&mut Context, &HandlerError) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            kind: HandlerKind::Error,
            dependency: Some(Dependency::of::<HandlerError>()),
            func: Arc::new(move |ctx| match ctx.get::<HandlerError>() {
                Some(err) => f(ctx, &err).into_reply(),
                None => {
                    tracing::warn!("error handler invoked without a bound error");
                    Reply::Empty
                }
            }),
        }
    }

    /// A handler that receives a service bound in the container.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waymark_core::{ChainScope, Container, Handler};
    /// use std::sync::Arc;
    ///
    /// struct Greeting(&'static str);
    ///
    /// let handler = Handler::inject(|_ctx, greeting: &Greeting| greeting.0);
    ///
    /// let mut container = Container::new();
    /// assert!(handler.validate(&container, ChainScope::Request).is_err());
    ///
    /// container.register(Arc::new(Greeting("hi")));
    /// assert!(handler.validate(&container, ChainScope::Request).is_ok());
    /// ```
    pub fn inject<S, F, R>(f: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&mut Context, &S) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            kind: HandlerKind::Inject,
            dependency: Some(Dependency::of::<S>()),
            func: Arc::new(move |ctx| match ctx.get::<S>() {
                Some(service) => f(ctx, &service).into_reply(),
                None => Reply::Error(InjectionError::not_registered::<S>().into()),
            }),
        }
    }

    /// Returns the signature this handler was built from.
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Returns the inputs this handler needs besides the context.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        self.dependency.as_slice()
    }

    /// Checks that every declared input can be provided in `scope`.
    ///
    /// [`HandlerError`] is only bound while the error chain runs; every
    /// other input must be registered in `container`.
    ///
    /// # Errors
    ///
    /// Returns the first input that cannot be provided.
    pub fn validate(&self, container: &Container, scope: ChainScope) -> Result<(), InjectionError> {
        for dependency in self.dependencies() {
            if dependency.type_id == TypeId::of::<HandlerError>() {
                if scope != ChainScope::Error {
                    return Err(InjectionError::ErrorChainOnly {
                        type_name: dependency.type_name,
                    });
                }
            } else if !container.contains_id(dependency.type_id) {
                return Err(InjectionError::NotRegistered {
                    type_name: dependency.type_name,
                });
            }
        }
        Ok(())
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: &mut Context) -> Reply {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind)
            .field("dependency", &self.dependency)
            .finish_non_exhaustive()
    }
}

/// Validates every handler of a chain.
///
/// # Errors
///
/// Returns the first [`InjectionError`] found.
pub fn validate_chain(handlers: &[Handler], container: &Container, scope: ChainScope) -> Result<(), InjectionError> {
    handlers
        .iter()
        .try_for_each(|handler| handler.validate(container, scope))
}
