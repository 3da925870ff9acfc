use bytes::{BufMut, BytesMut};
use http::StatusCode;
use serde::Serialize;

use super::{RenderError, respond};
use crate::response::Response;

fn to_json<T: Serialize + ?Sized>(value: &T, indent: bool) -> Result<Vec<u8>, RenderError> {
    let json = if indent {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    Ok(json)
}

/// Serializes values with `serde_json`.
///
/// Defaults to `application/json; charset=UTF-8`, compact output and no
/// prefix. With [`indent`](JsonRender::indent) the document is pretty-printed
/// with two spaces and ends in a newline. A [`prefix`](JsonRender::prefix)
/// such as `)]}',\n` is written before the document.
#[derive(Clone, Debug)]
pub struct JsonRender {
    content_type: String,
    charset: String,
    indent: bool,
    prefix: Vec<u8>,
}

impl JsonRender {
    pub fn new() -> Self {
        Self {
            content_type: String::from("application/json"),
            charset: String::from(super::DEFAULT_CHARSET),
            indent: false,
            prefix: Vec::new(),
        }
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = value.into();
        self
    }

    pub fn charset(mut self, value: impl Into<String>) -> Self {
        self.charset = value.into();
        self
    }

    pub fn indent(mut self, value: bool) -> Self {
        self.indent = value;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn render<T>(&self, status: StatusCode, value: &T) -> Result<Response, RenderError>
    where
        T: Serialize + ?Sized,
    {
        let json = to_json(value, self.indent)?;

        let mut body = BytesMut::with_capacity(self.prefix.len() + json.len() + 1);
        body.put_slice(&self.prefix);
        body.put_slice(&json);
        if self.indent {
            body.put_u8(b'\n');
        }
        Ok(respond(status, &self.content_type, &self.charset, body.freeze()))
    }
}

impl Default for JsonRender {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a JSON document in a JavaScript callback: `callback(<json>);`.
///
/// Defaults to `application/javascript; charset=UTF-8`. The callback name is
/// written as given; validate it before passing user input.
#[derive(Clone, Debug)]
pub struct JsonpRender {
    content_type: String,
    charset: String,
    indent: bool,
}

impl JsonpRender {
    pub fn new() -> Self {
        Self {
            content_type: String::from("application/javascript"),
            charset: String::from(super::DEFAULT_CHARSET),
            indent: false,
        }
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = value.into();
        self
    }

    pub fn charset(mut self, value: impl Into<String>) -> Self {
        self.charset = value.into();
        self
    }

    pub fn indent(mut self, value: bool) -> Self {
        self.indent = value;
        self
    }

    pub fn render<T>(&self, status: StatusCode, callback: &str, value: &T) -> Result<Response, RenderError>
    where
        T: Serialize + ?Sized,
    {
        let json = to_json(value, self.indent)?;

        let mut body = BytesMut::with_capacity(callback.len() + json.len() + 4);
        body.put_slice(callback.as_bytes());
        body.put_u8(b'(');
        body.put_slice(&json);
        body.put_slice(b");");
        if self.indent {
            body.put_u8(b'\n');
        }
        Ok(respond(status, &self.content_type, &self.charset, body.freeze()))
    }
}

impl Default for JsonpRender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::ser::Error as _;

    use super::*;

    #[derive(Serialize)]
    struct Greeting {
        one: &'static str,
        two: &'static str,
    }

    const GREETING: Greeting = Greeting { one: "hello", two: "world" };

    fn body(res: &Response) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not today"))
        }
    }

    #[test]
    fn compact_json() {
        let res = JsonRender::new().render(StatusCode::OK, &GREETING).unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.content_type(), Some("application/json; charset=UTF-8"));
        assert_eq!(body(&res), r#"{"one":"hello","two":"world"}"#);
    }

    #[test]
    fn indented_json_ends_with_a_newline() {
        let res = JsonRender::new().indent(true).render(StatusCode::OK, &GREETING).unwrap();
        assert_eq!(body(&res), "{\n  \"one\": \"hello\",\n  \"two\": \"world\"\n}\n");
    }

    #[test]
    fn prefix_comes_first() {
        let res = JsonRender::new()
            .prefix(")]}',\n")
            .render(StatusCode::OK, &GREETING)
            .unwrap();
        assert_eq!(body(&res), ")]}',\n{\"one\":\"hello\",\"two\":\"world\"}");
    }

    #[test]
    fn status_content_type_and_charset() {
        let res = JsonRender::new()
            .content_type("application/vnd.api+json")
            .charset("ISO-8859-1")
            .render(StatusCode::CREATED, &BTreeMap::from([("id", 1)]))
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.content_type(), Some("application/vnd.api+json; charset=ISO-8859-1"));
        assert_eq!(body(&res), r#"{"id":1}"#);
    }

    #[test]
    fn serialization_failure_is_an_error() {
        let err = JsonRender::new().render(StatusCode::OK, &Unserializable).unwrap_err();
        assert!(matches!(err, RenderError::Json(_)));

        let err = JsonpRender::new().render(StatusCode::OK, "cb", &Unserializable).unwrap_err();
        assert!(matches!(err, RenderError::Json(_)));
    }

    #[test]
    fn jsonp_wraps_the_document() {
        let res = JsonpRender::new().render(StatusCode::OK, "callback", &GREETING).unwrap();
        assert_eq!(res.content_type(), Some("application/javascript; charset=UTF-8"));
        assert_eq!(body(&res), r#"callback({"one":"hello","two":"world"});"#);
    }

    #[test]
    fn indented_jsonp() {
        let res = JsonpRender::new()
            .indent(true)
            .render(StatusCode::OK, "callback", &GREETING)
            .unwrap();
        assert_eq!(
            body(&res),
            "callback({\n  \"one\": \"hello\",\n  \"two\": \"world\"\n});\n"
        );
    }
}
