#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use slumber_api::api::Renderer;
use slumber_api::auth::{JwtTokenAuthority, TokenAuthority};
use slumber_api::database::models::{Role, User, UserStatus};
use slumber_api::database::repositories::{self, UserRepository};
use slumber_api::database::{Db, MemoryStore};
use slumber_api::handlers;
use slumber_api::router::{Routes, VersionedRouter};
use slumber_api::server::{self, AppState, HttpOptions};

pub const PASSWORD: &str = "correct horse battery staple";

pub fn demo_token_authority() -> Arc<JwtTokenAuthority> {
    let tokens = JwtTokenAuthority::from_pem(
        include_bytes!("../../keys/demo.rsa"),
        include_bytes!("../../keys/demo.rsa.pub"),
    )
    .expect("demo keys should load");
    Arc::new(tokens)
}

/// In-memory state with the same indexes `database::connect` creates
pub async fn test_state() -> AppState {
    let db: Db = Arc::new(MemoryStore::new());
    repositories::ensure_indexes(&db)
        .await
        .expect("memory store indexes should build");
    AppState::new(db, Renderer::new(false), demo_token_authority())
}

/// The composed application driven in-process with `oneshot`
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::from_state(test_state().await)
    }

    pub fn from_state(state: AppState) -> Self {
        let router = server::build_app(state.clone(), &HttpOptions::default())
            .expect("built-in routes should register");
        Self { state, router }
    }

    /// Built-in resources plus `extra` routes
    pub async fn with_routes(extra: Routes) -> Self {
        let state = test_state().await;
        let mut versioned =
            VersionedRouter::new(handlers::access_controller(state.renderer.clone()));
        versioned
            .register_all(handlers::routes())
            .expect("built-in routes should register");
        versioned.register_all(extra).expect("extra routes should register");
        let router = server::compose(versioned, state.clone(), &HttpOptions::default());
        Self { state, router }
    }

    pub fn request(method: Method, uri: &str) -> TestRequest {
        TestRequest {
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
        }
    }

    pub async fn send(&self, request: TestRequest) -> Result<TestResponse> {
        let request = request.builder.body(request.body)?;
        let response = self.router.clone().oneshot(request).await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Ok(TestResponse {
            status,
            content_type,
            body,
        })
    }

    pub async fn seed_user(&self, username: &str, status: UserStatus, roles: &[Role]) -> Result<User> {
        let mut user = User::pending(username, format!("{}@example.com", username));
        user.status = status;
        user.roles = roles.to_vec();
        user.set_password(PASSWORD)?;
        UserRepository::new(self.state.db.clone())
            .create_user(&mut user)
            .await?;
        Ok(user)
    }

    pub async fn seed_active(&self, username: &str) -> Result<User> {
        self.seed_user(username, UserStatus::Active, &[Role::User]).await
    }

    pub async fn seed_admin(&self, username: &str) -> Result<User> {
        self.seed_user(username, UserStatus::Active, &[Role::Admin, Role::User])
            .await
    }

    /// Sign a token directly, skipping the sessions endpoint
    pub fn token_for(&self, user: &User) -> Result<String> {
        Ok(self.state.tokens.create_session_token(user)?)
    }
}

pub struct TestRequest {
    builder: axum::http::request::Builder,
    body: Body,
}

impl TestRequest {
    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(body.to_string());
        self
    }

    pub fn raw(mut self, body: &'static str) -> Self {
        self.body = Body::from(body);
        self
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// The compiled binary running on a free port, killed on drop
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_slumber-api"))
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .args(["--port", &port.to_string(), "--host", "127.0.0.1"])
            .env("APP_ENV", "development")
            .env_remove("DATABASE_URL")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
