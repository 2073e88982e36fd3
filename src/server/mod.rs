//! HTTP composition and lifecycle.
//!
//! [`build_app`] assembles the versioned routes, the health check and the
//! middleware stack into one `axum::Router`. [`serve`] binds it and runs
//! until SIGINT/SIGTERM, then drains in-flight requests for at most
//! `server.shutdown_timeout_secs`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::api::Renderer;
use crate::auth::TokenAuthority;
use crate::config::AppConfig;
use crate::context::ContextStore;
use crate::database::repositories::RevokedTokenRepository;
use crate::database::Db;
use crate::error::ApiError;
use crate::handlers;
use crate::handlers::sessions::SessionHooks;
use crate::middleware::{authenticator_middleware, context_middleware};
use crate::router::{RouteError, VersionedRouter};

/// Collaborators shared by every request
#[derive(Clone)]
pub struct AppState {
    pub contexts: Arc<ContextStore>,
    pub db: Db,
    pub renderer: Renderer,
    pub tokens: Arc<dyn TokenAuthority>,
    pub session_hooks: Option<Arc<dyn SessionHooks>>,
}

impl AppState {
    pub fn new(db: Db, renderer: Renderer, tokens: Arc<dyn TokenAuthority>) -> Self {
        Self {
            contexts: ContextStore::new(),
            db,
            renderer,
            tokens,
            session_hooks: None,
        }
    }

    pub fn with_session_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.session_hooks = Some(hooks);
        self
    }
}

/// Layers that only depend on configuration
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub body_limit_bytes: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
}

impl HttpOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            body_limit_bytes: Some(config.server.body_limit_bytes),
            cors_origins: config
                .security
                .enable_cors
                .then(|| config.security.cors_origins.clone()),
        }
    }
}

/// Build the application router with the built-in resources
pub fn build_app(state: AppState, options: &HttpOptions) -> Result<Router, RouteError> {
    let mut router = VersionedRouter::new(handlers::access_controller(state.renderer.clone()));
    router.register_all(handlers::routes())?;
    info!("Registered {} versioned routes", router.route_names().count());

    Ok(compose(router, state, options))
}

/// Wrap an already populated router in the health check, the 404 fallback
/// and the middleware stack
pub fn compose(router: VersionedRouter, state: AppState, options: &HttpOptions) -> Router {
    // Layers listed first run innermost
    let mut app = router
        .into_router()
        .route("/health", get(handlers::health::health))
        .fallback(|| async { ApiError::not_found("Resource not found") })
        .layer(from_fn_with_state(state.clone(), authenticator_middleware))
        .layer(from_fn_with_state(state, context_middleware));

    if let Some(limit) = options.body_limit_bytes {
        app = app.layer(RequestBodyLimitLayer::new(limit));
    }
    app = app.layer(TraceLayer::new_for_http());
    if let Some(origins) = &options.cors_origins {
        app = app.layer(cors_layer(origins));
    }
    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Periodically forget revocations whose tokens have expired on their own
pub fn spawn_revocation_sweeper(db: Db, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let repo = RevokedTokenRepository::new(db);
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match repo.delete_expired_tokens().await {
                Ok(0) => {}
                Ok(n) => info!("Removed {} expired token revocations", n),
                Err(e) => error!("Failed to remove expired token revocations: {}", e),
            }
        }
    })
}

/// Bind and serve `app` until a shutdown signal arrives
pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Slumber API listening on http://{}", listener.local_addr()?);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!("Shutdown signal received, draining for up to {:?}", timeout);
    let _ = stop_tx.send(());

    match tokio::time::timeout(timeout, &mut server).await {
        Ok(result) => {
            result??;
            info!("Server shut down");
        }
        Err(_) => {
            warn!("In-flight requests did not finish within {:?}, aborting", timeout);
            server.abort();
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
