use axum::{http::StatusCode, response::Response};
use serde::Serialize;

use crate::context::RequestContext;

/// Handler response envelope: the payload's fields plus `message` and `success`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    pub message: String,
    pub success: bool,
    #[serde(skip)]
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self::with_status(data, message, StatusCode::OK)
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, message: impl Into<String>, status_code: StatusCode) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
            status_code,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(data, message, StatusCode::CREATED)
    }

    /// Render through the request's renderer so output settings apply
    pub fn render(self, ctx: &RequestContext) -> Response {
        ctx.renderer()
            .unwrap_or_default()
            .json(self.status_code, &self)
    }
}

/// Payload for responses that carry only the envelope
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(Empty {}, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_fields_are_flattened() {
        let response = ApiResponse::created(json!({ "token": "abc" }), "Session token created");
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({ "token": "abc", "message": "Session token created", "success": true })
        );
        assert_eq!(response.status_code, StatusCode::CREATED);
    }

    #[test]
    fn message_only_envelope() {
        let body = serde_json::to_value(ApiResponse::message("Session removed")).unwrap();
        assert_eq!(body, json!({ "message": "Session removed", "success": true }));
    }
}
