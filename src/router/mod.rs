//! API-version content negotiation.
//!
//! A [`Route`] owns one handler per API version. On each request the router
//! walks the `Accept` header in order and dispatches to the first JSON media
//! type whose `version` parameter names a registered handler, falling back to
//! the route's default version otherwise.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::acl::{AccessController, AclPredicate};
#[cfg(test)]
use crate::acl::predicate;
use crate::api::{parse_accept_header, AcceptHeaders};
use crate::context::{CurrentRoute, RequestContext};
use crate::error::ApiError;

pub type RouteHandler = Arc<dyn Fn(RequestContext, Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Runs before the access gate, typically to stash the addressed resource as
/// the context's current object
pub type ResourceLoader =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync>;

pub fn handler<F, Fut, R>(f: F) -> RouteHandler
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |ctx: RequestContext, request: Request| {
        f(ctx, request).map(IntoResponse::into_response).boxed()
    })
}

pub fn loader<F, Fut>(f: F) -> ResourceLoader
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext| f(ctx).boxed())
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("route `{route}` has no handler for its default version `{version}`")]
    MissingDefaultVersion { route: String, version: String },

    #[error("route name `{0}` is registered more than once")]
    DuplicateName(String),

    #[error("route `{route}` duplicates {method} {pattern}")]
    DuplicatePath {
        route: String,
        method: Method,
        pattern: String,
    },

    #[error("route `{route}` uses unsupported method {method}")]
    UnsupportedMethod { route: String, method: Method },
}

pub struct Route {
    /// Unique, and the action name the access gate checks
    pub name: String,
    pub method: Method,
    /// Path with `{param}` segments, e.g. `/api/users/{id}`
    pub pattern: String,
    pub default_version: String,
    pub handlers: HashMap<String, RouteHandler>,
    pub acl: Option<AclPredicate>,
    pub loader: Option<ResourceLoader>,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        method: Method,
        pattern: impl Into<String>,
        default_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            pattern: pattern.into(),
            default_version: default_version.into(),
            handlers: HashMap::new(),
            acl: None,
            loader: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>, handler: RouteHandler) -> Self {
        self.handlers.insert(version.into(), handler);
        self
    }

    pub fn with_acl(mut self, predicate: AclPredicate) -> Self {
        self.acl = Some(predicate);
        self
    }

    pub fn with_loader(mut self, loader: ResourceLoader) -> Self {
        self.loader = Some(loader);
        self
    }
}

pub type Routes = Vec<Route>;

/// Pick the handler version for a parsed `Accept` header.
///
/// Entries are considered in header order; quality factors are ignored.
pub fn select_version<'a, H>(
    accept: &AcceptHeaders,
    handlers: &'a HashMap<String, H>,
    default_version: &'a str,
) -> &'a str {
    accept
        .iter()
        .filter(|entry| entry.media_type.is_json())
        .find_map(|entry| {
            let requested = entry.media_type.param("version")?;
            handlers.get_key_value(requested).map(|(key, _)| key.as_str())
        })
        .unwrap_or(default_version)
}

static PATH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid path param regex"));

/// `/api/users/{id}` becomes `/api/users/:id`
pub fn translate_pattern(pattern: &str) -> String {
    PATH_PARAM.replace_all(pattern, ":$1").into_owned()
}

/// Collects versioned routes and turns them into an `axum::Router`
pub struct VersionedRouter {
    acl: AccessController,
    routes: Vec<Route>,
    names: HashSet<String>,
    paths: HashSet<(Method, String)>,
}

impl VersionedRouter {
    /// Predicates bound to routes are added to `acl` on registration, after
    /// whatever maps it already holds, so they take precedence.
    pub fn new(acl: AccessController) -> Self {
        Self {
            acl,
            routes: Vec::new(),
            names: HashSet::new(),
            paths: HashSet::new(),
        }
    }

    pub fn register(&mut self, route: Route) -> Result<(), RouteError> {
        if !route.handlers.contains_key(&route.default_version) {
            return Err(RouteError::MissingDefaultVersion {
                route: route.name,
                version: route.default_version,
            });
        }
        if self.names.contains(&route.name) {
            return Err(RouteError::DuplicateName(route.name));
        }
        if MethodFilter::try_from(route.method.clone()).is_err() {
            return Err(RouteError::UnsupportedMethod {
                route: route.name,
                method: route.method,
            });
        }
        let path_key = (route.method.clone(), translate_pattern(&route.pattern));
        if self.paths.contains(&path_key) {
            return Err(RouteError::DuplicatePath {
                route: route.name,
                method: route.method,
                pattern: route.pattern,
            });
        }

        if let Some(predicate) = &route.acl {
            self.acl.add_handler(route.name.clone(), predicate.clone());
        }
        self.names.insert(route.name.clone());
        self.paths.insert(path_key);
        self.routes.push(route);
        Ok(())
    }

    pub fn register_all(&mut self, routes: Routes) -> Result<(), RouteError> {
        routes.into_iter().try_for_each(|route| self.register(route))
    }

    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.name.as_str())
    }

    pub fn access_controller(&self) -> &AccessController {
        &self.acl
    }

    pub fn into_router(self) -> Router {
        let acl = Arc::new(self.acl);
        let mut by_path: HashMap<String, MethodRouter> = HashMap::new();

        for route in self.routes {
            let path = translate_pattern(&route.pattern);
            // Unsupported methods were rejected at registration
            let Ok(filter) = MethodFilter::try_from(route.method.clone()) else {
                continue;
            };
            let route = Arc::new(route);
            let acl = acl.clone();
            let endpoint = move |ctx: RequestContext,
                                 params: Option<Path<HashMap<String, String>>>,
                                 request: Request| {
                let route = route.clone();
                let acl = acl.clone();
                async move {
                    let params = params.map(|Path(params)| params).unwrap_or_default();
                    dispatch(route, acl, ctx, params, request).await
                }
            };

            let method_router = by_path.remove(&path).unwrap_or_else(MethodRouter::new);
            by_path.insert(path, method_router.on(filter, endpoint));
        }

        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| router.route(&path, method_router))
    }
}

async fn dispatch(
    route: Arc<Route>,
    acl: Arc<AccessController>,
    ctx: RequestContext,
    params: HashMap<String, String>,
    request: Request,
) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let version = select_version(&parse_accept_header(accept), &route.handlers, &route.default_version);
    debug!(route = %route.name, version, "Resolved route version");

    let Some(handler) = route.handlers.get(version).cloned() else {
        return ApiError::internal_server_error("No handler for resolved version").into_response();
    };

    ctx.set_current_route(CurrentRoute {
        name: route.name.clone(),
        version: version.to_string(),
        params,
    });

    // A failed load leaves the current object unset; the error is only
    // reported to callers the gate lets through
    let load_error = match &route.loader {
        Some(loader) => loader(ctx.clone()).await.err(),
        None => None,
    };

    acl.gate(&route.name, ctx, request, move |ctx, request| async move {
        match load_error {
            Some(e) => e.into_response(),
            None => handler(ctx, request).await,
        }
    })
    .await
}
