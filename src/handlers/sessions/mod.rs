use axum::{extract::Request, http::Method, response::Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::acl::{authenticated, anyone, predicate, AclMap};
use crate::context::RequestContext;
use crate::database::models::RevokedToken;
use crate::database::repositories::{RevokedTokenRepository, UserRepository};
use crate::error::ApiError;
use crate::handlers::{decode_json_body, require_db, require_token_authority, require_user};
use crate::middleware::ApiResponse;
use crate::router::{handler, Route, Routes};

mod hooks;

pub use hooks::SessionHooks;

pub const GET_SESSION: &str = "GetSession";
pub const CREATE_SESSION: &str = "CreateSession";
pub const DELETE_SESSION: &str = "DeleteSession";

pub fn routes() -> Routes {
    vec![
        Route::new(GET_SESSION, Method::GET, "/api/sessions", "0.0")
            .version("0.0", handler(get_session)),
        Route::new(CREATE_SESSION, Method::POST, "/api/sessions", "0.0")
            .version("0.0", handler(create_session)),
        Route::new(DELETE_SESSION, Method::DELETE, "/api/sessions", "0.0")
            .version("0.0", handler(delete_session)),
    ]
}

pub fn acl() -> AclMap {
    let mut map = AclMap::new();
    map.insert(GET_SESSION.into(), predicate(|_, _, user| authenticated(user)));
    map.insert(CREATE_SESSION.into(), predicate(|_, _, user| anyone(user)));
    map.insert(DELETE_SESSION.into(), predicate(|_, _, user| authenticated(user)));
    map
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// GET /api/sessions
pub async fn get_session(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let user = require_user(&ctx)?;
    Ok(ApiResponse::success(json!({ "user": user }), "Session details retrieved").render(&ctx))
}

/// POST /api/sessions
pub async fn create_session(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let body: CreateSessionRequest = decode_json_body(request).await?;
    if body.username.is_empty() {
        return Err(ApiError::bad_request("Empty username"));
    }

    let user = UserRepository::new(require_db(&ctx)?)
        .get_user_by_username(&body.username)
        .await?
        .filter(|user| user.is_credentials_verified(&body.password))
        .ok_or_else(|| {
            warn!("Failed sign-in attempt for {}", body.username);
            ApiError::bad_request("Invalid username/password")
        })?;

    let token = require_token_authority(&ctx)?.create_session_token(&user)?;
    info!(user_id = %user.id, "Session token created");

    if let Some(hooks) = ctx.session_hooks() {
        hooks.post_create_session(&ctx, &user, &token).await?;
    }

    Ok(ApiResponse::created(json!({ "token": token }), "Session token created").render(&ctx))
}

/// DELETE /api/sessions
///
/// Revokes the presented token by its `jti` until it would have expired.
pub async fn delete_session(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let claims = ctx.claims();
    if let Some(claims) = &claims {
        let revoked = RevokedToken::new(claims.jti.clone(), claims.exp);
        if let Err(e) = RevokedTokenRepository::new(require_db(&ctx)?)
            .create_revoked_token(&revoked)
            .await
        {
            warn!("Failed to create revoked token: {}", e);
        }
    }

    if let Some(hooks) = ctx.session_hooks() {
        hooks.post_delete_session(&ctx, claims.as_ref()).await?;
    }

    Ok(ApiResponse::message("Session removed").render(&ctx))
}
