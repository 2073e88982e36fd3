// handlers/mod.rs - Versioned API resources
//
// Each resource module exposes `routes()` (its versioned routes) and `acl()`
// (the predicates keyed by route name). The server merges every ACL map into
// one access controller before registering the routes.

pub mod customers;
pub mod health;
pub mod sessions;
pub mod users;

use axum::{body::to_bytes, extract::Query, extract::Request};
use serde::de::DeserializeOwned;

use crate::acl::AccessController;
use crate::api::Renderer;
use crate::auth::TokenAuthority;
use crate::context::RequestContext;
use crate::database::models::User;
use crate::database::Db;
use crate::error::ApiError;
use crate::router::Routes;

pub fn routes() -> Routes {
    let mut routes = users::routes();
    routes.extend(sessions::routes());
    routes.extend(customers::routes());
    routes
}

pub fn access_controller(renderer: Renderer) -> AccessController {
    let mut acl = AccessController::new(renderer);
    acl.add(users::acl());
    acl.add(sessions::acl());
    acl.add(customers::acl());
    acl
}

/// Parse the request body as JSON; failures answer 400
pub async fn decode_json_body<T: DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let bytes = to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ApiError::invalid_json(format!("Request body parse error: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::invalid_json(format!("Request body parse error: {}", e)))
}

pub fn decode_query<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    Query::<T>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

pub fn require_db(ctx: &RequestContext) -> Result<Db, ApiError> {
    ctx.db()
        .ok_or_else(|| ApiError::internal_server_error("Database handle missing from request context"))
}

pub fn require_token_authority(ctx: &RequestContext) -> Result<std::sync::Arc<dyn TokenAuthority>, ApiError> {
    ctx.token_authority()
        .ok_or_else(|| ApiError::internal_server_error("Token authority missing from request context"))
}

pub fn require_user(ctx: &RequestContext) -> Result<User, ApiError> {
    ctx.current_user()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// The `{id}` segment of the matched route
pub fn path_id(ctx: &RequestContext) -> String {
    ctx.current_route()
        .param("id")
        .unwrap_or_default()
        .to_string()
}
