//! # plumb
//!
//! Request plumbing for hyper services: per-request context storage,
//! composable middleware chains and response renderers.
//!
//! - [`context`]: attach values to one in-flight request and read them back
//!   from any later middleware or handler. Two interchangeable stores ship
//!   with the crate, one process-wide map and one that lives inside the
//!   request.
//! - [`middleware`]: immutable, reusable [`Chain`](middleware::Chain)s of
//!   interceptors folded around a terminal handler, plus ready-made
//!   middlewares for access logging, compression, panic recovery,
//!   content-type checks, method override and `X-Powered-By`.
//! - [`render`]: JSON, JSONP, XML, raw data and HTML template responses.
//! - [`Server`]: hyper-based HTTP/1.1 and HTTP/2 server with graceful
//!   shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use plumb::context::{ContextStore, MapStore, Value};
//! use plumb::middleware::{LogFormat, Logger, Next, Recovery, from_fn};
//! use plumb::render::JsonRender;
//! use plumb::{IntoResponse, Request, Response, Server, chain};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MapStore::new());
//!
//!     let auth_store = Arc::clone(&store);
//!     let auth = from_fn(move |mut req: Request, next: Next| {
//!         let store = Arc::clone(&auth_store);
//!         async move {
//!             let user = req.header("x-user").unwrap_or("anonymous").to_owned();
//!             store.set(&mut req, "user".into(), Value::new(user));
//!             next.run(req).await
//!         }
//!     });
//!
//!     let app = chain![
//!         store.clear_on_exit(),
//!         Recovery::new(),
//!         Logger::new(LogFormat::apache_common()),
//!         auth,
//!     ]
//!     .then(move |req: Request| {
//!         let user = store.get(&req, "user");
//!         async move {
//!             let name = user.downcast_ref::<String>().cloned().unwrap_or_default();
//!             JsonRender::new()
//!                 .render(StatusCode::OK, &serde_json::json!({ "user": name }))
//!                 .into_response()
//!         }
//!     });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod context;
pub mod middleware;
pub mod render;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use request::{Request, RequestId};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
