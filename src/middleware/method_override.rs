//! Method override for clients limited to `GET` and `POST`.

use std::sync::Arc;

use http::Method;
use tracing::trace;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;

const FORM_KEY: &str = "_method";
const HEADER: &str = "x-http-method-override";

/// Rewrites the method of a `POST` request from its `_method` form value or,
/// failing that, its `X-HTTP-Method-Override` header.
///
/// Only `PUT`, `PATCH` and `DELETE` are honored. Other methods are never
/// overridden, so a `GET` cannot be turned into a write.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodOverride;

impl MethodOverride {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for MethodOverride {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(OverrideHandler { next })
    }
}

struct OverrideHandler {
    next: BoxedHandler,
}

fn requested_override(req: &Request) -> Option<Method> {
    let requested = req
        .form_value(FORM_KEY)
        .filter(|m| !m.is_empty())
        .or_else(|| req.header(HEADER).map(str::to_owned))?;
    match requested.as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

impl ErasedHandler for OverrideHandler {
    fn call(&self, mut req: Request) -> BoxFuture {
        if req.method() == Method::POST {
            if let Some(method) = requested_override(&req) {
                trace!(%method, "method overridden");
                req.set_method(method);
            }
        }
        self.next.call(req)
    }
}
