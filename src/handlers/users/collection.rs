use axum::{extract::Request, response::Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::RequestContext;
use crate::database::models::{NewUser, User};
use crate::database::repositories::UserRepository;
use crate::database::{FindOptions, SortOrder};
use crate::error::ApiError;
use crate::handlers::{decode_json_body, decode_query, require_db};
use crate::middleware::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Case-insensitive username substring
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user: NewUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUsersRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// GET /api/users
pub async fn list_users(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let params: ListParams = decode_query(&request)?;
    let repo = UserRepository::new(require_db(&ctx)?);

    let options = FindOptions {
        limit: params.limit,
        skip: params.skip.unwrap_or(0),
        ..FindOptions::sorted_by("createdDate", SortOrder::Ascending)
    };
    let users = repo.get_users(params.search.as_deref(), &options).await?;

    Ok(ApiResponse::success(json!({ "users": users }), "User list retrieved").render(&ctx))
}

/// GET /api/users/count
pub async fn count_users(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let count = UserRepository::new(require_db(&ctx)?).count_users().await?;
    Ok(ApiResponse::success(json!({ "count": count }), "User count retrieved").render(&ctx))
}

/// POST /api/users
pub async fn create_user(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let body: CreateUserRequest = decode_json_body(request).await?;
    let repo = UserRepository::new(require_db(&ctx)?);

    if repo.user_exists_by_username(&body.user.username).await? {
        return Err(ApiError::bad_request("Username already exists"));
    }
    if repo.user_exists_by_email(&body.user.email).await? {
        return Err(ApiError::bad_request("User with email address already exists"));
    }

    // New accounts stay pending, without roles, until the code is confirmed
    let mut user = User::pending(body.user.username, body.user.email);
    if !user.is_valid() {
        return Err(ApiError::bad_request("Invalid user object"));
    }
    user.set_password(&body.user.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::bad_request("Failed to save user object")
    })?;

    repo.create_user(&mut user).await.map_err(|e| {
        tracing::error!("Failed to save user: {}", e);
        ApiError::bad_request("Failed to save user object")
    })?;
    tracing::info!(user_id = %user.id, "Created user {}", user.username);

    Ok(ApiResponse::created(json!({ "user": user }), "User created").render(&ctx))
}

/// PUT /api/users
pub async fn update_users(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let body: UpdateUsersRequest = decode_json_body(request).await?;
    if body.action != "delete" {
        return Err(ApiError::bad_request("Invalid action"));
    }

    let removed = UserRepository::new(require_db(&ctx)?)
        .delete_users(&body.ids)
        .await?;
    tracing::info!("Batch removed {} users", removed);

    Ok(ApiResponse::success(body, "User list updated").render(&ctx))
}

/// DELETE /api/users
pub async fn delete_all_users(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let removed = UserRepository::new(require_db(&ctx)?)
        .delete_all_users()
        .await?;
    tracing::info!("Removed all {} users", removed);

    Ok(ApiResponse::message("All users deleted").render(&ctx))
}
