//! Named authorization predicates and the gate that enforces them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{request::Parts, StatusCode},
    response::Response,
};
use serde_json::json;
use tracing::debug;

use crate::api::Renderer;
use crate::context::RequestContext;
use crate::database::models::{Role, User};

pub const FORBIDDEN_MESSAGE: &str = "Forbidden (403)";
pub const OK_MESSAGE: &str = "OK";

/// Decides whether `user` may perform an action; returns the verdict and a
/// reason (empty for the default wording)
pub type AclPredicate =
    Arc<dyn Fn(&Parts, &RequestContext, Option<&User>) -> (bool, String) + Send + Sync>;

pub type AclMap = HashMap<String, AclPredicate>;

/// Wrap a closure as an [`AclPredicate`]
pub fn predicate<F>(f: F) -> AclPredicate
where
    F: Fn(&Parts, &RequestContext, Option<&User>) -> (bool, String) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Default)]
pub struct AccessController {
    handlers: AclMap,
    renderer: Renderer,
}

impl AccessController {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            handlers: AclMap::new(),
            renderer,
        }
    }

    /// Merge `map` into the registry; entries replace earlier ones of the same name
    pub fn add(&mut self, map: AclMap) {
        self.handlers.extend(map);
    }

    pub fn add_handler(&mut self, action: impl Into<String>, predicate: AclPredicate) {
        self.handlers.insert(action.into(), predicate);
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn authorize(
        &self,
        parts: &Parts,
        ctx: &RequestContext,
        action: &str,
        user: Option<&User>,
    ) -> (bool, String) {
        let Some(predicate) = self.handlers.get(action) else {
            return (false, FORBIDDEN_MESSAGE.to_string());
        };

        let (allowed, message) = predicate(parts, ctx, user);
        let message = match (allowed, message.is_empty()) {
            (true, true) => OK_MESSAGE.to_string(),
            (false, true) => FORBIDDEN_MESSAGE.to_string(),
            (_, false) => message,
        };
        (allowed, message)
    }

    /// Run `next` only if the current user may perform `action`; otherwise
    /// answer 403 with the predicate's reason. Denials are always JSON,
    /// whatever the caller accepts.
    pub async fn gate<F, Fut>(&self, action: &str, ctx: RequestContext, request: Request, next: F) -> Response
    where
        F: FnOnce(RequestContext, Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (parts, body) = request.into_parts();
        let user = ctx.current_user();
        let (allowed, message) = self.authorize(&parts, &ctx, action, user.as_ref());
        debug!(action, allowed, user = user.as_ref().map(|u| u.id.as_str()), "Access decision");

        if !allowed {
            return self.renderer.json(
                StatusCode::FORBIDDEN,
                &json!({ "message": message, "success": false }),
            );
        }
        next(ctx, Request::from_parts(parts, body)).await
    }
}

/// Require a signed-in user
pub fn authenticated(user: Option<&User>) -> (bool, String) {
    (user.is_some(), String::new())
}

/// Require a signed-in user with `active` status
pub fn active_user(user: Option<&User>) -> (bool, String) {
    match user {
        Some(user) => (user.is_active(), String::new()),
        None => (false, String::new()),
    }
}

/// Require an active user holding the admin role
pub fn active_admin(user: Option<&User>) -> (bool, String) {
    match user {
        Some(user) => (
            user.is_active() && user.has_role(Role::Admin),
            String::new(),
        ),
        None => (false, String::new()),
    }
}

pub fn anyone(_user: Option<&User>) -> (bool, String) {
    (true, String::new())
}
