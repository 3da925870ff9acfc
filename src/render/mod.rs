//! Response renderers.
//!
//! A renderer turns a value into a complete [`Response`] with a status and a
//! `Content-Type: <type>; charset=<charset>` header. Renderers are plain
//! configuration values: build one at startup, share it, and call `render`
//! from handlers.
//!
//! ```rust
//! use http::StatusCode;
//! use plumb::render::JsonRender;
//! use plumb::{IntoResponse, Request, Response};
//!
//! #[derive(serde::Serialize)]
//! struct User { id: u32 }
//!
//! async fn show(_req: Request) -> Response {
//!     JsonRender::new()
//!         .render(StatusCode::OK, &User { id: 7 })
//!         .into_response()
//! }
//! ```
//!
//! A failure to serialize or to execute a template is returned as a
//! [`RenderError`] and no response is produced. Returned from a handler, the
//! error becomes a logged `500`.

use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

use crate::response::Response;

mod data;
mod json;
mod template;
mod xml;

pub use data::DataRender;
pub use json::{JsonRender, JsonpRender};
pub use template::{
    DiskTemplateFactory, StaticTemplateFactory, TemplateFactory, TemplateOptions, TemplateRender,
};
pub use xml::XmlRender;

/// Charset written when a renderer's charset is empty.
pub const DEFAULT_CHARSET: &str = "UTF-8";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml serialization failed: {0}")]
    Xml(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("template source unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// `<content_type>; charset=<charset>`, defaulting the charset.
fn content_type(content_type: &str, charset: &str) -> String {
    let charset = if charset.is_empty() { DEFAULT_CHARSET } else { charset };
    format!("{content_type}; charset={charset}")
}

/// Shared by every renderer: status, content type and body.
fn respond(status: StatusCode, ct: &str, charset: &str, body: impl Into<Bytes>) -> Response {
    Response::builder()
        .status(status)
        .bytes(&content_type(ct, charset), body)
}
