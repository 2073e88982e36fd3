use axum::{extract::Request, response::Response};
use serde::Deserialize;
use serde_json::json;

use crate::acl::FORBIDDEN_MESSAGE;
use crate::context::RequestContext;
use crate::database::models::{Role, UserStatus, UserUpdate};
use crate::database::repositories::UserRepository;
use crate::error::ApiError;
use crate::handlers::{decode_json_body, decode_query, path_id, require_db};
use crate::middleware::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmParams {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub user: UserUpdate,
}

/// GET /api/users/{id}
pub async fn get_user(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    let user = UserRepository::new(require_db(&ctx)?)
        .get_user_by_id(&path_id(&ctx))
        .await
        .map_err(|_| ApiError::bad_request("User not found"))?;

    Ok(ApiResponse::success(json!({ "user": user }), "User retrieved").render(&ctx))
}

/// GET /api/users/{id}/confirm?code=
pub async fn confirm_user(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let params: ConfirmParams = decode_query(&request)?;
    let id = path_id(&ctx);
    let repo = UserRepository::new(require_db(&ctx)?);

    let user = repo.get_user_by_id(&id).await?;
    if user.status != UserStatus::Pending {
        return Err(ApiError::bad_request("User not pending confirmation"));
    }
    if !user.is_code_verified(&params.code) {
        return Err(ApiError::bad_request("Invalid code"));
    }

    let changes = UserUpdate {
        status: Some(UserStatus::Active),
        roles: Some(vec![Role::User]),
        ..Default::default()
    };
    let user = repo.update_user(&id, &changes).await?;

    Ok(ApiResponse::success(json!({ "code": params.code, "user": user }), "User confirmed").render(&ctx))
}

/// PUT /api/users/{id}
pub async fn update_user(ctx: RequestContext, request: Request) -> Result<Response, ApiError> {
    let body: UpdateUserRequest = decode_json_body(request).await?;

    // Only admins may change status or roles, including their own
    let is_admin = ctx
        .current_user()
        .map(|u| u.has_role(Role::Admin))
        .unwrap_or(false);
    if body.user.touches_privileges() && !is_admin {
        return Err(ApiError::forbidden(FORBIDDEN_MESSAGE));
    }

    let user = UserRepository::new(require_db(&ctx)?)
        .update_user(&path_id(&ctx), &body.user)
        .await?;

    Ok(ApiResponse::success(json!({ "user": user }), "User updated").render(&ctx))
}

/// DELETE /api/users/{id}
pub async fn delete_user(ctx: RequestContext, _request: Request) -> Result<Response, ApiError> {
    UserRepository::new(require_db(&ctx)?)
        .delete_user(&path_id(&ctx))
        .await?;

    Ok(ApiResponse::message("User deleted").render(&ctx))
}
