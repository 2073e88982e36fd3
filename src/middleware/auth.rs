use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::database::repositories::{RevokedTokenRepository, UserRepository};
use crate::error::ApiError;
use crate::server::AppState;

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid format, expected Authorization: Bearer [token]";
pub const UNVERIFIED_TOKEN_MESSAGE: &str = "Unable to verify token string";
pub const REVOKED_TOKEN_MESSAGE: &str = "Token has been revoked";

/// Bearer token authentication.
///
/// Requests without an `Authorization` header pass through anonymously. A
/// present but unusable header ends the request with 401. On success the
/// verified claims, and the user they name when it still exists, are stored
/// in the request context.
pub async fn authenticator_middleware(
    State(state): State<AppState>,
    ctx: RequestContext,
    request: Request,
    next: Next,
) -> Response {
    let Some(value) = request.headers().get(header::AUTHORIZATION).cloned() else {
        return next.run(request).await;
    };

    let Some(token) = value.to_str().ok().and_then(parse_bearer) else {
        warn!("Rejected malformed Authorization header");
        return ApiError::unauthorized(INVALID_FORMAT_MESSAGE).into_response();
    };

    let claims = match state.tokens.verify_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Token verification failed: {}", e);
            return ApiError::unauthorized(UNVERIFIED_TOKEN_MESSAGE).into_response();
        }
    };

    match RevokedTokenRepository::new(state.db.clone())
        .is_token_revoked(&claims.jti)
        .await
    {
        Ok(false) => {}
        Ok(true) => {
            warn!(jti = %claims.jti, "Rejected revoked token");
            return ApiError::unauthorized(REVOKED_TOKEN_MESSAGE).into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    let user = UserRepository::new(state.db.clone())
        .get_user_by_id(&claims.user_id)
        .await;
    ctx.set_claims(claims);
    match user {
        Ok(user) => ctx.set_current_user(user),
        Err(e) => debug!("Authenticated user could not be loaded: {}", e),
    }

    next.run(request).await
}

/// Exactly two space-separated tokens, the first `Bearer` in any case
fn parse_bearer(value: &str) -> Option<&str> {
    let mut tokens = value.split(' ');
    let (Some(scheme), Some(token), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return None;
    };
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}
