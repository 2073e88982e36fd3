mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use common::TestApp;

#[tokio::test]
async fn context_entries_are_released_after_each_request() -> Result<()> {
    let app = TestApp::new().await;
    let alice = app.seed_active("alice").await?;
    let token = app.token_for(&alice)?;

    app.send(TestApp::request(Method::GET, "/api/sessions").bearer(&token))
        .await?;
    app.send(TestApp::request(Method::GET, "/api/sessions")).await?;
    app.send(TestApp::request(Method::GET, "/api/nowhere")).await?;
    app.send(TestApp::request(Method::GET, "/health")).await?;

    assert!(app.state.contexts.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_authorization_header_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await;

    for value in ["Bearer", "Token abc", "Bearer a b", "bearer"] {
        let response = app
            .send(TestApp::request(Method::GET, "/api/sessions").header("authorization", value))
            .await?;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "header {:?}", value);
        assert_eq!(
            response.message(),
            "Invalid format, expected Authorization: Bearer [token]"
        );
    }
    Ok(())
}

#[tokio::test]
async fn scheme_is_case_insensitive() -> Result<()> {
    let app = TestApp::new().await;
    let alice = app.seed_active("alice").await?;
    let token = app.token_for(&alice)?;

    let response = app
        .send(
            TestApp::request(Method::GET, "/api/sessions")
                .header("authorization", &format!("BEARER {}", token)),
        )
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unverifiable_token_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await;
    let response = app
        .send(TestApp::request(Method::GET, "/api/sessions").bearer("not.a.jwt"))
        .await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Unable to verify token string");
    Ok(())
}

#[tokio::test]
async fn token_for_deleted_user_is_anonymous() -> Result<()> {
    let app = TestApp::new().await;
    let alice = app.seed_active("alice").await?;
    let token = app.token_for(&alice)?;
    slumber_api::database::repositories::UserRepository::new(app.state.db.clone())
        .delete_user(&alice.id)
        .await?;

    let response = app
        .send(TestApp::request(Method::GET, "/api/sessions").bearer(&token))
        .await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn anonymous_request_to_authenticated_action_is_forbidden() -> Result<()> {
    let app = TestApp::new().await;
    let response = app.send(TestApp::request(Method::DELETE, "/api/sessions")).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["success"], false);
    Ok(())
}

#[tokio::test]
async fn health_reports_database() -> Result<()> {
    let app = TestApp::new().await;
    let response = app.send(TestApp::request(Method::GET, "/health")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn denial_is_json_even_when_text_is_accepted() -> Result<()> {
    let app = TestApp::new().await;
    let response = app
        .send(TestApp::request(Method::GET, "/api/sessions").header("accept", "text/plain"))
        .await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(
        response.content_type.starts_with("application/json"),
        "content type {:?}",
        response.content_type
    );
    assert_eq!(response.message(), "Forbidden (403)");
    Ok(())
}

#[tokio::test]
async fn health_renders_xml_when_asked() -> Result<()> {
    let app = TestApp::new().await;
    let response = app
        .send(TestApp::request(Method::GET, "/health").header("accept", "application/xml"))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response.content_type.starts_with("application/xml"),
        "content type {:?}",
        response.content_type
    );
    Ok(())
}
