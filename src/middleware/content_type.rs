//! Request `Content-Type` validation.

use std::sync::Arc;

use http::{Method, StatusCode};
use mime::Mime;
use tracing::debug;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;

/// Rejects `POST`, `PUT` and `PATCH` requests whose body media type or
/// charset is not on the accepted lists.
///
/// Other methods pass through unchecked. By default any media type is
/// accepted, the charset must be `UTF-8`, a missing `charset` parameter is
/// assumed to be `UTF-8`, and rejected requests get `415 Unsupported Media
/// Type`.
///
/// ```rust
/// use plumb::middleware::ContentTypeChecker;
///
/// let checker = ContentTypeChecker::new()
///     .accepted_contents(["application/json", "application/x-www-form-urlencoded"])
///     .accepted_charsets(["utf-8", "iso-8859-1"]);
/// ```
#[derive(Clone)]
pub struct ContentTypeChecker {
    contents: Arc<[String]>,
    charsets: Arc<[String]>,
    assumed_charset: String,
    error_handler: BoxedHandler,
}

impl ContentTypeChecker {
    pub fn new() -> Self {
        Self {
            contents: Arc::new([]),
            charsets: Arc::new([String::from("UTF-8")]),
            assumed_charset: String::from("UTF-8"),
            error_handler: (|_req: Request| async { StatusCode::UNSUPPORTED_MEDIA_TYPE })
                .into_boxed_handler(),
        }
    }

    /// Media types (`type/subtype`, no parameters) to accept. Empty accepts
    /// everything.
    pub fn accepted_contents<I, S>(mut self, contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.contents = contents
            .into_iter()
            .map(|c| c.as_ref().trim().to_ascii_lowercase())
            .collect();
        self
    }

    /// Charsets to accept, compared case-insensitively. Empty accepts
    /// everything.
    pub fn accepted_charsets<I, S>(mut self, charsets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.charsets = charsets
            .into_iter()
            .map(|c| c.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    /// Charset used when the request names none.
    pub fn assumed_charset(mut self, charset: impl Into<String>) -> Self {
        self.assumed_charset = charset.into();
        self
    }

    /// Handler answering rejected requests.
    pub fn error_handler(mut self, handler: impl Handler) -> Self {
        self.error_handler = handler.into_boxed_handler();
        self
    }

    fn accepts(&self, content_type: Option<&str>) -> bool {
        let parsed = content_type.and_then(|ct| ct.parse::<Mime>().ok());
        let media_type = parsed.as_ref().map_or("", Mime::essence_str);
        let charset = parsed
            .as_ref()
            .and_then(|m| m.get_param(mime::CHARSET))
            .map(|c| c.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| self.assumed_charset.to_ascii_uppercase());

        let content_ok = self.contents.is_empty() || self.contents.iter().any(|c| c == media_type);
        let charset_ok = self.charsets.is_empty() || self.charsets.contains(&charset);
        content_ok && charset_ok
    }
}

impl Default for ContentTypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentTypeChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentTypeChecker")
            .field("contents", &self.contents)
            .field("charsets", &self.charsets)
            .field("assumed_charset", &self.assumed_charset)
            .finish_non_exhaustive()
    }
}

impl Middleware for ContentTypeChecker {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(CheckerHandler { checker: self.clone(), next })
    }
}

struct CheckerHandler {
    checker: ContentTypeChecker,
    next: BoxedHandler,
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

impl ErasedHandler for CheckerHandler {
    fn call(&self, req: Request) -> BoxFuture {
        if !has_body(req.method()) {
            return self.next.call(req);
        }
        let content_type = req.header("content-type");
        if self.checker.accepts(content_type) {
            self.next.call(req)
        } else {
            debug!(content_type, method = %req.method(), "unsupported request content type");
            self.checker.error_handler.call(req)
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::middleware::Chain;
    use crate::response::Response;

    async fn check(checker: ContentTypeChecker, method: &str, content_type: Option<&str>) -> StatusCode {
        let handler = Chain::empty()
            .with(checker)
            .then(|_req: Request| async { Response::new() });
        let mut req = http::Request::builder().method(method).uri("/");
        if let Some(ct) = content_type {
            req = req.header("content-type", ct);
        }
        let req = Request::from(req.body(Bytes::new()).unwrap());
        handler.call(req).await.status_code()
    }

    #[tokio::test]
    async fn methods_without_body_are_not_checked() {
        let checker = ContentTypeChecker::new().accepted_contents(["application/json"]);
        for method in ["GET", "HEAD", "DELETE", "OPTIONS"] {
            assert_eq!(check(checker.clone(), method, Some("text/csv")).await, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn defaults_accept_any_utf8_body() {
        for method in ["POST", "PUT", "PATCH"] {
            let status = check(ContentTypeChecker::new(), method, Some("text/plain")).await;
            assert_eq!(status, StatusCode::OK);
        }
        let status = check(ContentTypeChecker::new(), "POST", Some("text/plain; charset=utf-8")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check(ContentTypeChecker::new(), "POST", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn other_charsets_are_rejected_by_default() {
        let status = check(ContentTypeChecker::new(), "POST", Some("text/plain; charset=ISO-8859-1")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn accepted_contents_restrict_the_media_type() {
        let checker = ContentTypeChecker::new().accepted_contents(["application/json"]);
        assert_eq!(check(checker.clone(), "POST", Some("application/json")).await, StatusCode::OK);
        assert_eq!(
            check(checker.clone(), "POST", Some("Application/JSON; charset=UTF-8")).await,
            StatusCode::OK
        );
        assert_eq!(
            check(checker.clone(), "POST", Some("text/xml")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(check(checker.clone(), "POST", None).await, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            check(checker, "POST", Some("not a media type")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[tokio::test]
    async fn charsets_compare_case_insensitively() {
        let checker = ContentTypeChecker::new().accepted_charsets(["iso-8859-1"]);
        assert_eq!(
            check(checker.clone(), "PUT", Some("text/plain; charset=ISO-8859-1")).await,
            StatusCode::OK
        );
        assert_eq!(
            check(checker, "PUT", Some("text/plain")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[tokio::test]
    async fn assumed_charset_fills_in_a_missing_parameter() {
        let checker = ContentTypeChecker::new()
            .accepted_charsets(["ISO-8859-1"])
            .assumed_charset("iso-8859-1");
        assert_eq!(check(checker, "PATCH", Some("text/plain")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_charset_list_accepts_everything() {
        let checker = ContentTypeChecker::new().accepted_charsets(Vec::<String>::new());
        assert_eq!(
            check(checker, "POST", Some("text/plain; charset=koi8-r")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn custom_error_handler_answers_rejections() {
        let checker = ContentTypeChecker::new()
            .accepted_contents(["application/json"])
            .error_handler(|_req: Request| async { StatusCode::BAD_REQUEST });
        assert_eq!(check(checker, "POST", Some("text/plain")).await, StatusCode::BAD_REQUEST);
    }
}
