//! `X-Powered-By` response header.

use std::sync::Arc;

use http::HeaderValue;
use http::header::HeaderName;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Appends `X-Powered-By: <tag>` to every response.
#[derive(Clone, Debug)]
pub struct PoweredBy {
    tag: Option<HeaderValue>,
}

impl PoweredBy {
    /// A tag that is not a valid header value is logged and ignored.
    pub fn new(tag: &str) -> Self {
        let tag = HeaderValue::try_from(tag)
            .inspect_err(|_| tracing::warn!(tag, "invalid X-Powered-By tag, header disabled"))
            .ok();
        Self { tag }
    }
}

impl Middleware for PoweredBy {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        match &self.tag {
            Some(tag) => Arc::new(PoweredByHandler { tag: tag.clone(), next }),
            None => next,
        }
    }
}

struct PoweredByHandler {
    tag: HeaderValue,
    next: BoxedHandler,
}

impl ErasedHandler for PoweredByHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let tag = self.tag.clone();
        let fut = self.next.call(req);
        Box::pin(async move {
            let mut res = fut.await;
            res.headers_mut().append(X_POWERED_BY, tag);
            res
        })
    }
}
