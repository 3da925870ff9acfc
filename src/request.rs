//! Incoming HTTP request type.
//!
//! A [`Request`] owns everything a handler needs: method, URI, headers, the
//! fully collected body and a [`RequestId`]. The id is the request's
//! *identity*. Context stores key their data on it, never on request content,
//! so two byte-identical requests still get separate storage.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};

// ── RequestId ─────────────────────────────────────────────────────────────────

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one in-flight request.
///
/// Allocated once when the [`Request`] is built. `Request` is not `Clone`, so
/// an id always names exactly one request.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// An incoming HTTP request with its body already collected.
pub struct Request {
    id: RequestId,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self {
            id: RequestId::next(),
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
            remote_addr: None,
        }
    }

    /// Attaches the peer address. The server does this for every connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn id(&self) -> RequestId { self.id }
    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Replaces the request method. Used by method-override middleware.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the first value of a form field.
    ///
    /// A `application/x-www-form-urlencoded` body is searched first, then the
    /// query string.
    pub fn form_value(&self, key: &str) -> Option<String> {
        let from_body = self
            .header("content-type")
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .filter(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
            .and_then(|_| find_pair(&self.body, key));

        from_body.or_else(|| {
            self.uri
                .query()
                .and_then(|q| find_pair(q.as_bytes(), key))
        })
    }
}

fn find_pair(input: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}
