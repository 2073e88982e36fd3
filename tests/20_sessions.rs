mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, PASSWORD};
use slumber_api::auth::Claims;
use slumber_api::context::RequestContext;
use slumber_api::database::models::{User, UserStatus};
use slumber_api::error::ApiError;
use slumber_api::handlers::sessions::SessionHooks;

async fn sign_in(app: &TestApp, username: &str, password: &str) -> Result<common::TestResponse> {
    app.send(
        TestApp::request(Method::POST, "/api/sessions")
            .json(json!({ "username": username, "password": password })),
    )
    .await
}

#[tokio::test]
async fn create_session_returns_token() -> Result<()> {
    let app = TestApp::new().await;
    app.seed_active("alice").await?;

    let response = sign_in(&app, "alice", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.message(), "Session token created");
    assert!(!response.body["token"].as_str().unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn pending_users_can_sign_in() -> Result<()> {
    let app = TestApp::new().await;
    app.seed_user("pending", UserStatus::Pending, &[]).await?;

    let response = sign_in(&app, "pending", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected() -> Result<()> {
    let app = TestApp::new().await;
    app.seed_active("alice").await?;

    let response = sign_in(&app, "alice", "wrong").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Invalid username/password");

    let response = sign_in(&app, "nobody", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Invalid username/password");

    let response = sign_in(&app, "", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Empty username");
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_bad_request() -> Result<()> {
    let app = TestApp::new().await;
    let response = app
        .send(TestApp::request(Method::POST, "/api/sessions").raw("{not json"))
        .await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert!(response.message().starts_with("Request body parse error"));
    Ok(())
}

#[tokio::test]
async fn get_session_returns_current_user() -> Result<()> {
    let app = TestApp::new().await;
    let alice = app.seed_active("alice").await?;
    let token = app.token_for(&alice)?;

    let response = app
        .send(TestApp::request(Method::GET, "/api/sessions").bearer(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["username"], "alice");
    assert!(response.body["user"].get("hashedPassword").is_none());
    Ok(())
}

#[tokio::test]
async fn anonymous_session_lookup_is_forbidden() -> Result<()> {
    let app = TestApp::new().await;
    let response = app.send(TestApp::request(Method::GET, "/api/sessions")).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.message(), "Forbidden (403)");
    Ok(())
}

#[tokio::test]
async fn deleted_session_token_is_revoked() -> Result<()> {
    let app = TestApp::new().await;
    app.seed_active("alice").await?;
    let token = sign_in(&app, "alice", PASSWORD).await?.body["token"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let response = app
        .send(TestApp::request(Method::DELETE, "/api/sessions").bearer(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "Session removed");

    let response = app
        .send(TestApp::request(Method::DELETE, "/api/sessions").bearer(&token))
        .await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Token has been revoked");
    Ok(())
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
    refuse_sign_in: bool,
}

#[async_trait]
impl SessionHooks for RecordingHooks {
    async fn post_create_session(
        &self,
        _ctx: &RequestContext,
        user: &User,
        token: &str,
    ) -> Result<(), ApiError> {
        assert!(!token.is_empty());
        self.events.lock().unwrap().push(format!("created {}", user.username));
        if self.refuse_sign_in {
            return Err(ApiError::bad_request("Sign-in is disabled"));
        }
        Ok(())
    }

    async fn post_delete_session(
        &self,
        ctx: &RequestContext,
        claims: Option<&Claims>,
    ) -> Result<(), ApiError> {
        let username = ctx.current_user().map(|u| u.username).unwrap_or_default();
        self.events
            .lock()
            .unwrap()
            .push(format!("deleted {} {}", username, claims.is_some()));
        Ok(())
    }
}

#[tokio::test]
async fn session_hooks_run_after_create_and_delete() -> Result<()> {
    let hooks = Arc::new(RecordingHooks::default());
    let app = TestApp::from_state(common::test_state().await.with_session_hooks(hooks.clone()));
    app.seed_active("alice").await?;

    let response = sign_in(&app, "alice", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::CREATED);
    let token = response.body["token"].as_str().unwrap_or_default().to_string();

    let response = app
        .send(TestApp::request(Method::DELETE, "/api/sessions").bearer(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(
        *hooks.events.lock().unwrap(),
        vec!["created alice".to_string(), "deleted alice true".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn failing_create_hook_replaces_the_token_response() -> Result<()> {
    let hooks = Arc::new(RecordingHooks {
        refuse_sign_in: true,
        ..Default::default()
    });
    let app = TestApp::from_state(common::test_state().await.with_session_hooks(hooks.clone()));
    app.seed_active("alice").await?;

    let response = sign_in(&app, "alice", PASSWORD).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Sign-in is disabled");
    assert!(response.body.get("token").is_none());
    assert_eq!(hooks.events.lock().unwrap().len(), 1);
    Ok(())
}
