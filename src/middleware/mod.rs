//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: access logging, compression, header injection,
//! request validation and panic containment.
//!
//! A [`Middleware`] receives the next handler and returns a new handler that
//! does its own work before and/or after delegating. A [`Chain`] is an
//! immutable list of middlewares; [`Chain::then`] folds it around a terminal
//! handler so that for `[A, B, C]` and terminal `T` a request flows
//!
//! ```text
//! A → B → C → T
//!             ↓
//! A ← B ← C ← response
//! ```
//!
//! A middleware that never calls the next handler short-circuits the chain:
//! nothing downstream runs, and that is not an error.
//!
//! The chain adds no fault isolation. A panic anywhere unwinds through every
//! enclosing middleware unless [`Recovery`] sits outside it.
//!
//! # Example
//!
//! ```rust
//! use plumb::middleware::{Chain, Next, PoweredBy, from_fn};
//! use plumb::{Request, Response};
//!
//! let timing = from_fn(|req: Request, next: Next| async move {
//!     let started = std::time::Instant::now();
//!     let mut res = next.run(req).await;
//!     let took = format!("{}us", started.elapsed().as_micros());
//!     if let Ok(value) = took.parse() {
//!         res.headers_mut().insert("x-response-time", value);
//!     }
//!     res
//! });
//!
//! let app = Chain::empty()
//!     .with(PoweredBy::new("plumb"))
//!     .with(timing)
//!     .then(|_req: Request| async { Response::text("hello") });
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, NoopHandler};
use crate::request::Request;
use crate::response::Response;

mod compress;
mod content_type;
mod logging;
mod method_override;
mod powered_by;
mod recovery;

pub use compress::Compress;
pub use content_type::ContentTypeChecker;
pub use logging::{APACHE_TIME_FORMAT, LogFormat, Logger, Record};
pub use method_override::MethodOverride;
pub use powered_by::PoweredBy;
pub use recovery::Recovery;

// ── Middleware ────────────────────────────────────────────────────────────────

/// Wraps a handler in cross-cutting behavior.
///
/// `wrap` is called once per [`Chain::then`], not per request. Per-request
/// work belongs in the returned handler.
///
/// Any `Fn(BoxedHandler) -> BoxedHandler` is a middleware. For the common
/// case of an async interceptor, [`from_fn`] is shorter.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// A type-erased middleware, as stored in a [`Chain`].
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Erases a middleware so it can be mixed with others in a [`Chain`].
pub fn boxed(middleware: impl Middleware) -> BoxedMiddleware {
    Arc::new(middleware)
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// The rest of the chain, as seen from inside a [`from_fn`] middleware.
#[derive(Clone)]
pub struct Next(BoxedHandler);

impl Next {
    /// Hands the request to the next middleware or the terminal handler.
    pub async fn run(self, req: Request) -> Response {
        self.0.call(req).await
    }
}

/// Builds a middleware from an async closure taking the request and [`Next`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(Arc::new(f))
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(Arc<F>);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(FromFnHandler { f: Arc::clone(&self.0), next })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F, Fut> ErasedHandler for FromFnHandler<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        Box::pin((self.f)(req, Next(Arc::clone(&self.next))))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An immutable, ordered list of middlewares.
///
/// Every combinator returns a new chain backed by its own storage; neither
/// the receiver nor the arguments change. A chain is usually built once at
/// startup and may be materialized any number of times with different
/// terminal handlers.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<BoxedMiddleware>,
}

impl Chain {
    /// Builds a chain, preserving the order of `middlewares`.
    pub fn new<I>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        Self { middlewares: middlewares.into_iter().collect() }
    }

    /// A chain with no middleware. `Chain::empty().then(h)` behaves as `h`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Folds the chain around `handler`.
    ///
    /// `[A, B, C].then(T)` is `A(B(C(T)))`: `A` sees the request first and
    /// the response last.
    pub fn then(&self, handler: impl Handler) -> BoxedHandler {
        self.wrap(handler.into_boxed_handler())
    }

    /// Folds the chain around a terminal handler that does nothing and
    /// answers an empty `200 OK`.
    pub fn then_noop(&self) -> BoxedHandler {
        self.wrap(Arc::new(NoopHandler))
    }

    fn wrap(&self, terminal: BoxedHandler) -> BoxedHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(terminal, |next, middleware| middleware.wrap(next))
    }

    /// A new chain running this chain's middlewares, then `other`'s.
    ///
    /// ```text
    /// [a, b, c].concat([d, e]) == [a, b, c, d, e]
    /// ```
    pub fn concat(&self, other: &Chain) -> Chain {
        self.extend(other.middlewares.iter().cloned())
    }

    /// A new chain with `middlewares` appended.
    ///
    /// ```text
    /// [a, b, c].extend([d, e]) == [a, b, c, d, e]
    /// ```
    pub fn extend<I>(&self, middlewares: I) -> Chain
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        let middlewares = middlewares.into_iter();
        let mut combined = Vec::with_capacity(self.middlewares.len() + middlewares.size_hint().0);
        combined.extend(self.middlewares.iter().cloned());
        combined.extend(middlewares);
        Chain { middlewares: combined }
    }

    /// A new chain with one more middleware at the end.
    pub fn with(&self, middleware: impl Middleware) -> Chain {
        self.extend([boxed(middleware)])
    }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.middlewares.len()).finish()
    }
}

/// Builds a [`Chain`] from middlewares of different types.
///
/// ```rust
/// use plumb::chain;
/// use plumb::middleware::{Compress, PoweredBy, Recovery};
///
/// let chain = chain![Recovery::new(), Compress::new(), PoweredBy::new("plumb")];
/// assert_eq!(chain.len(), 3);
/// ```
#[macro_export]
macro_rules! chain {
    ($($middleware:expr),* $(,)?) => {
        $crate::middleware::Chain::new([$($crate::middleware::boxed($middleware)),*])
    };
}
