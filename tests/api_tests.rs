mod common;

use admin_portal::{
    AppConfig, AppState, bootstrap::ensure_admin, create_router, repository::RepositoryState,
};
use common::test_repo;
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Serves the full router on an ephemeral port with a bootstrapped admin account.
async fn spawn_app() -> (TestApp, RepositoryState) {
    let repo = test_repo().await;
    let config = AppConfig::default();
    ensure_admin(&repo, &config.admin)
        .await
        .expect("bootstrap admin should be created");

    let state = AppState {
        repo: repo.clone(),
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (TestApp { address }, repo)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .expect("req fail")
        .json()
        .await
        .expect("openapi should be JSON");
    assert!(doc["paths"]["/api/question_bank/questions/{id}/status"].is_object());
    assert!(doc["paths"]["/api/feature_requests/{id}/vote"].is_object());
}

#[tokio::test]
async fn test_bootstrap_admin_session_lifecycle() {
    let (app, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let defaults = AppConfig::default().admin;

    let login: Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&json!({ "username": defaults.username, "password": defaults.password }))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    let token = login["access_token"].as_str().expect("access token").to_string();
    assert_eq!(login["user"]["roles"], json!(["admin"]));

    let created = client
        .post(format!("{}/api/role_management/roles", app.address))
        .bearer_auth(&token)
        .json(&json!({ "name": "support", "description": "Support desk" }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);

    let roles: Value = client
        .get(format!("{}/api/role_management/roles", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = roles
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["role"]["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"support"));
    assert!(names.contains(&"admin"));

    let logout = client
        .post(format!("{}/api/auth/logout", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("req fail");
    assert_eq!(logout.status(), reqwest::StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let (_, repo) = spawn_app().await;
    let again = ensure_admin(&repo, &AppConfig::default().admin)
        .await
        .unwrap();
    assert!(again.is_none());
}
