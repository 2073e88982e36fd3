//! Per-request key/value storage shared across middleware boundaries.
//!
//! One [`ContextStore`] serves every in-flight request. Each request gets a
//! [`RequestContext`] handle (a request id plus the shared store) that rides
//! in the request extensions, and a [`ContextScope`] guard owned by the
//! outermost middleware that releases the request's entries when dropped.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use dashmap::DashMap;
use uuid::Uuid;

use crate::api::Renderer;
use crate::auth::{Claims, TokenAuthority};
use crate::database::models::User;
use crate::database::Db;
use crate::error::ApiError;
use crate::handlers::sessions::SessionHooks;

pub const CURRENT_USER_KEY: &str = "current-user";
pub const CLAIMS_KEY: &str = "authenticated-claims";
pub const DATABASE_KEY: &str = "database";
pub const RENDERER_KEY: &str = "renderer";
pub const TOKEN_AUTHORITY_KEY: &str = "token-authority";
pub const CURRENT_ROUTE_KEY: &str = "current-route";
pub const CURRENT_OBJECT_KEY: &str = "current-object";
pub const SESSION_HOOKS_KEY: &str = "session-hooks";

type ContextValue = Arc<dyn Any + Send + Sync>;

/// Route the router resolved for this request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentRoute {
    pub name: String,
    pub version: String,
    pub params: HashMap<String, String>,
}

impl CurrentRoute {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Default)]
pub struct ContextStore {
    entries: DashMap<Uuid, HashMap<&'static str, ContextValue>>,
}

impl ContextStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set(&self, id: Uuid, key: &'static str, value: ContextValue) {
        self.entries.entry(id).or_default().insert(key, value);
    }

    fn get(&self, id: Uuid, key: &'static str) -> Option<ContextValue> {
        self.entries.get(&id)?.get(key).cloned()
    }

    fn clear(&self, id: Uuid) {
        self.entries.remove(&id);
    }

    /// Number of requests currently holding entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to one request's slice of the [`ContextStore`]
#[derive(Clone)]
pub struct RequestContext {
    id: Uuid,
    store: Arc<ContextStore>,
}

impl RequestContext {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Guard that drops every entry of this request when it goes out of scope
    pub fn scope(&self) -> ContextScope {
        ContextScope {
            id: self.id,
            store: self.store.clone(),
        }
    }

    pub fn set<T: Any + Send + Sync>(&self, key: &'static str, value: T) {
        self.store.set(self.id, key, Arc::new(value));
    }

    /// `None` when the key is absent or holds a value of another type
    pub fn get<T: Any + Send + Sync + Clone>(&self, key: &'static str) -> Option<T> {
        self.store
            .get(self.id, key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    pub fn set_current_user(&self, user: User) {
        self.set(CURRENT_USER_KEY, user);
    }

    pub fn current_user(&self) -> Option<User> {
        self.get(CURRENT_USER_KEY)
    }

    pub fn set_claims(&self, claims: Claims) {
        self.set(CLAIMS_KEY, claims);
    }

    pub fn claims(&self) -> Option<Claims> {
        self.get(CLAIMS_KEY)
    }

    pub fn set_db(&self, db: Db) {
        self.set(DATABASE_KEY, db);
    }

    pub fn db(&self) -> Option<Db> {
        self.get(DATABASE_KEY)
    }

    pub fn set_renderer(&self, renderer: Renderer) {
        self.set(RENDERER_KEY, renderer);
    }

    pub fn renderer(&self) -> Option<Renderer> {
        self.get(RENDERER_KEY)
    }

    pub fn set_token_authority(&self, authority: Arc<dyn TokenAuthority>) {
        self.set(TOKEN_AUTHORITY_KEY, authority);
    }

    pub fn token_authority(&self) -> Option<Arc<dyn TokenAuthority>> {
        self.get(TOKEN_AUTHORITY_KEY)
    }

    pub fn set_current_route(&self, route: CurrentRoute) {
        self.set(CURRENT_ROUTE_KEY, route);
    }

    pub fn current_route(&self) -> CurrentRoute {
        self.get(CURRENT_ROUTE_KEY).unwrap_or_default()
    }

    pub fn set_current_object<T: Any + Send + Sync>(&self, object: T) {
        self.set(CURRENT_OBJECT_KEY, object);
    }

    pub fn current_object<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.get(CURRENT_OBJECT_KEY)
    }

    pub fn set_session_hooks(&self, hooks: Arc<dyn SessionHooks>) {
        self.set(SESSION_HOOKS_KEY, hooks);
    }

    pub fn session_hooks(&self) -> Option<Arc<dyn SessionHooks>> {
        self.get(SESSION_HOOKS_KEY)
    }
}

/// Releases a request's context entries on drop, including during unwinding
pub struct ContextScope {
    id: Uuid,
    store: Arc<ContextStore>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.store.clear(self.id);
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal_server_error("Request context not initialised"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::UserStatus;

    #[test]
    fn absent_keys_read_as_none() {
        let ctx = RequestContext::new(ContextStore::new());
        assert!(ctx.current_user().is_none());
        assert!(ctx.claims().is_none());
        assert!(ctx.db().is_none());
        assert_eq!(ctx.current_route(), CurrentRoute::default());
    }

    #[test]
    fn type_mismatch_reads_as_none() {
        let ctx = RequestContext::new(ContextStore::new());
        ctx.set("answer", 42u32);
        assert_eq!(ctx.get::<u32>("answer"), Some(42));
        assert_eq!(ctx.get::<String>("answer"), None);
    }

    #[test]
    fn requests_do_not_see_each_other() {
        let store = ContextStore::new();
        let a = RequestContext::new(store.clone());
        let b = RequestContext::new(store.clone());

        let mut user = User::pending("alice", "alice@example.com");
        user.status = UserStatus::Active;
        a.set_current_user(user);

        assert!(a.current_user().is_some());
        assert!(b.current_user().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn scope_releases_entries() {
        let store = ContextStore::new();
        let ctx = RequestContext::new(store.clone());
        {
            let _scope = ctx.scope();
            ctx.set_current_object("customer".to_string());
            assert_eq!(ctx.current_object::<String>().as_deref(), Some("customer"));
            assert!(!store.is_empty());
        }
        assert!(store.is_empty());
        assert!(ctx.current_object::<String>().is_none());
    }

    #[test]
    fn scope_releases_entries_on_panic() {
        let store = ContextStore::new();
        let ctx = RequestContext::new(store.clone());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ctx.scope();
            ctx.set("k", 1u8);
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_requests_are_isolated() {
        let store = ContextStore::new();
        let handles: Vec<_> = (0..8u32)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let ctx = RequestContext::new(store);
                    let _scope = ctx.scope();
                    for _ in 0..100 {
                        ctx.set("n", n);
                        assert_eq!(ctx.get::<u32>("n"), Some(n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(store.is_empty());
    }
}
