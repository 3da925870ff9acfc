use http::StatusCode;
use quick_xml::se::Serializer;
use serde::Serialize;

use super::{RenderError, respond};
use crate::response::Response;

/// Serializes values to XML with `quick-xml`.
///
/// Defaults to `text/xml; charset=UTF-8`, compact output and no prefix. The
/// root element is named after the serialized type unless
/// [`root`](XmlRender::root) overrides it. With [`indent`](XmlRender::indent)
/// elements are indented by two spaces and the document ends in a newline.
/// A [`prefix`](XmlRender::prefix), typically an XML declaration, is written
/// before the document.
#[derive(Clone, Debug)]
pub struct XmlRender {
    content_type: String,
    charset: String,
    indent: bool,
    prefix: String,
    root: Option<String>,
}

impl XmlRender {
    pub fn new() -> Self {
        Self {
            content_type: String::from("text/xml"),
            charset: String::from(super::DEFAULT_CHARSET),
            indent: false,
            prefix: String::new(),
            root: None,
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

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn root(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    pub fn render<T>(&self, status: StatusCode, value: &T) -> Result<Response, RenderError>
    where
        T: Serialize + ?Sized,
    {
        let mut body = self.prefix.clone();
        {
            let mut ser = match &self.root {
                Some(root) => Serializer::with_root(&mut body, Some(root.as_str())).map_err(xml_error)?,
                None => Serializer::new(&mut body),
            };
            if self.indent {
                ser.indent(' ', 2);
            }
            value.serialize(ser).map_err(xml_error)?;
        }
        if self.indent {
            body.push('\n');
        }
        Ok(respond(status, &self.content_type, &self.charset, body))
    }
}

impl Default for XmlRender {
    fn default() -> Self {
        Self::new()
    }
}

fn xml_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Xml(e.to_string())
}
