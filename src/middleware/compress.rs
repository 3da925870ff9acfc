//! Response compression.
//!
//! The client's `Accept-Encoding` is read left to right and the first of
//! `gzip` or `deflate` wins. Quality values are not weighed.

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, VARY};
use http::{HeaderValue, Method, StatusCode};
use tracing::warn;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    /// First supported coding in an `Accept-Encoding` value.
    fn negotiate(accept: &str) -> Option<Self> {
        accept.split(',').find_map(|coding| match coding.trim() {
            "gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            _ => None,
        })
    }

    fn header_value(self) -> HeaderValue {
        match self {
            Self::Gzip => HeaderValue::from_static("gzip"),
            Self::Deflate => HeaderValue::from_static("deflate"),
        }
    }

    fn encode(self, level: Compression, body: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), level);
                encoder.write_all(body)?;
                encoder.finish()
            }
            // Raw DEFLATE (RFC 1951), no zlib wrapper.
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::with_capacity(body.len() / 2), level);
                encoder.write_all(body)?;
                encoder.finish()
            }
        }
    }
}

/// Compresses response bodies with gzip or deflate when the client accepts it.
///
/// On a compressed response `Content-Encoding` is set, `Vary:
/// Accept-Encoding` appended, and a missing `Content-Type` is sniffed from the
/// uncompressed body.
#[derive(Clone, Copy, Debug)]
pub struct Compress {
    level: Compression,
}

impl Compress {
    /// Default compression level (6).
    pub fn new() -> Self {
        Self { level: Compression::default() }
    }

    /// Compression level, 0 (none) to 9 (best).
    pub fn level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }
}

impl Default for Compress {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Compress {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(CompressHandler { level: self.level, next })
    }
}

struct CompressHandler {
    level: Compression,
    next: BoxedHandler,
}

impl ErasedHandler for CompressHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let encoding = req.header(ACCEPT_ENCODING.as_str()).and_then(Encoding::negotiate);
        let head = req.method() == Method::HEAD;
        let level = self.level;
        let fut = self.next.call(req);
        Box::pin(async move {
            let res = fut.await;
            match encoding {
                Some(encoding) if !head && has_body(&res) => compress(res, encoding, level),
                _ => res,
            }
        })
    }
}

/// Bodiless responses are never encoded or sniffed.
fn has_body(res: &Response) -> bool {
    let status = res.status_code();
    !(res.body().is_empty()
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

fn compress(mut res: Response, encoding: Encoding, level: Compression) -> Response {
    let encoded = match encoding.encode(level, res.body()) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(?encoding, "compression failed, sending identity: {e}");
            return res;
        }
    };

    if !res.headers().contains_key(CONTENT_TYPE) {
        let sniffed = sniff_content_type(res.body());
        res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(sniffed));
    }
    let headers = res.headers_mut();
    headers.insert(CONTENT_ENCODING, encoding.header_value());
    headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
    res.set_body(Bytes::from(encoded));
    res
}

/// Cheap content sniffing for bodies sent without a content type.
fn sniff_content_type(body: &[u8]) -> &'static str {
    let Ok(text) = std::str::from_utf8(body) else {
        return "application/octet-stream";
    };
    let head = text.trim_start();
    let starts_with = |prefix: &str| {
        head.get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
    };
    if starts_with("<!doctype html") || starts_with("<html") {
        "text/html; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    }
}
