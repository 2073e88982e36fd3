use axum::{
    body::Bytes,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::accept::{parse_accept_header, AcceptHeaders};

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";
const DATA_CONTENT_TYPE: &str = "application/octet-stream";
const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

/// Element wrapping XML bodies
const XML_ROOT: &str = "response";

/// Output formats the renderer can negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderType {
    #[default]
    Json,
    Text,
    Data,
    Xml,
}

/// Response writer shared by the access gate and every handler.
///
/// Handlers normally call [`Renderer::json`] directly; [`Renderer::render`]
/// picks the format from the request's `Accept` header.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    indent_json: bool,
    default_render_type: RenderType,
}

impl Renderer {
    pub fn new(indent_json: bool) -> Self {
        Self {
            indent_json,
            default_render_type: RenderType::Json,
        }
    }

    pub fn with_default_render_type(mut self, render_type: RenderType) -> Self {
        self.default_render_type = render_type;
        self
    }

    pub fn json<T: Serialize>(&self, status: StatusCode, body: &T) -> Response {
        match self.encode(body) {
            Ok(bytes) => (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], bytes).into_response(),
            Err(e) => serialization_failure(e),
        }
    }

    pub fn text(&self, status: StatusCode, body: impl Into<String>) -> Response {
        (status, [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body.into()).into_response()
    }

    pub fn data(&self, status: StatusCode, body: impl Into<Bytes>) -> Response {
        (status, [(header::CONTENT_TYPE, DATA_CONTENT_TYPE)], body.into()).into_response()
    }

    /// Serialize `body` as XML under a `<response>` root element
    pub fn xml<T: Serialize>(&self, status: StatusCode, body: &T) -> Response {
        match quick_xml::se::to_string_with_root(XML_ROOT, body) {
            Ok(xml) => (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], xml).into_response(),
            Err(e) => serialization_failure(e),
        }
    }

    /// First `Accept` entry naming a supported format wins; otherwise the default
    pub fn negotiate(&self, accept: &AcceptHeaders) -> RenderType {
        for entry in accept {
            let m = &entry.media_type;
            if m.subtype == "json" || m.suffix == "json" {
                return RenderType::Json;
            }
            if m.subtype == "xml" || m.suffix == "xml" {
                return RenderType::Xml;
            }
            if m.main_type == "text" {
                return RenderType::Text;
            }
            if m.subtype == "octet-stream" {
                return RenderType::Data;
            }
        }
        self.default_render_type
    }

    pub fn render<T: Serialize>(&self, headers: &HeaderMap, status: StatusCode, body: &T) -> Response {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        match self.negotiate(&parse_accept_header(accept)) {
            RenderType::Json => self.json(status, body),
            RenderType::Text => match self.encode(body) {
                Ok(bytes) => self.text(status, String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => serialization_failure(e),
            },
            RenderType::Data => match self.encode(body) {
                Ok(bytes) => self.data(status, bytes),
                Err(e) => serialization_failure(e),
            },
            RenderType::Xml => self.xml(status, body),
        }
    }

    fn encode<T: Serialize>(&self, body: &T) -> serde_json::Result<Vec<u8>> {
        if self.indent_json {
            serde_json::to_vec_pretty(body)
        } else {
            serde_json::to_vec(body)
        }
    }
}

fn serialization_failure(e: impl std::fmt::Display) -> Response {
    tracing::error!("Failed to serialize response data: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
        r#"{"success":false,"message":"Failed to serialize response data"}"#,
    )
        .into_response()
}
