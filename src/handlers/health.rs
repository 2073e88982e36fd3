use axum::{
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde_json::json;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::handlers::require_db;

/// GET /health
///
/// Liveness plus a database ping. Not versioned and not access controlled;
/// the output format follows the `Accept` header.
pub async fn health(ctx: RequestContext, headers: HeaderMap) -> Result<Response, ApiError> {
    let renderer = ctx.renderer().unwrap_or_default();
    let now = chrono::Utc::now();

    let response = match require_db(&ctx)?.ping().await {
        Ok(()) => renderer.render(
            &headers,
            StatusCode::OK,
            &json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            }),
        ),
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            renderer.render(
                &headers,
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({
                    "success": false,
                    "message": "Database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                }),
            )
        }
    };
    Ok(response)
}
