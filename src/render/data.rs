use bytes::Bytes;
use http::StatusCode;

use super::respond;
use crate::response::Response;

/// Sends bytes as they are. Defaults to `application/json; charset=UTF-8`.
#[derive(Clone, Debug)]
pub struct DataRender {
    content_type: String,
    charset: String,
}

impl DataRender {
    pub fn new() -> Self {
        Self {
            content_type: String::from("application/json"),
            charset: String::from(super::DEFAULT_CHARSET),
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

    pub fn render(&self, status: StatusCode, data: impl Into<Bytes>) -> Response {
        respond(status, &self.content_type, &self.charset, data)
    }
}

impl Default for DataRender {
    fn default() -> Self {
        Self::new()
    }
}
