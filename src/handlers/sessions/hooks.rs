use async_trait::async_trait;

use crate::auth::Claims;
use crate::context::RequestContext;
use crate::database::models::User;
use crate::error::ApiError;

/// Callbacks an embedding application can attach to the sessions resource.
///
/// Both run after the built-in work is done and before the response is
/// rendered. An error replaces the success response.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// A token was issued for `user`
    async fn post_create_session(
        &self,
        _ctx: &RequestContext,
        _user: &User,
        _token: &str,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    /// The caller signed out. `claims` is `None` when the token carried none
    /// to revoke.
    async fn post_delete_session(
        &self,
        _ctx: &RequestContext,
        _claims: Option<&Claims>,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}
