#![allow(dead_code)]

use admin_portal::{
    AppConfig, AppState,
    auth::hash_password,
    create_router,
    models::{CreateUserRequest, User},
    repository::{self, RepositoryState, RoleRepository, SqliteRepository, UserRepository},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// Opens `db_url` and applies every migration and seed.
pub async fn open_pool(db_url: &str) -> SqlitePool {
    let pool = repository::connect(db_url)
        .await
        .expect("database should open");
    repository::migrate(&pool)
        .await
        .expect("migrations should apply");
    pool
}

/// A fresh in-memory database with every migration and seed applied.
pub async fn test_repo() -> RepositoryState {
    let pool = open_pool("sqlite::memory:").await;
    Arc::new(SqliteRepository::new(pool)) as RepositoryState
}

/// A migrated database file in a temporary directory, served by a multi-connection
/// pool. Keep the `TempDir` alive for as long as the repository is used.
pub async fn file_repo() -> (TempDir, RepositoryState) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let url = format!("sqlite://{}", dir.path().join("admin_portal.db").display());
    let pool = open_pool(&url).await;
    (dir, Arc::new(SqliteRepository::new(pool)) as RepositoryState)
}

pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_repo(test_repo().await)
    }

    pub fn with_repo(repo: RepositoryState) -> Self {
        let state = AppState {
            repo: repo.clone(),
            config: AppConfig::default(),
        };
        Self {
            router: create_router(state),
            repo,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should not fail")
    }

    /// Sends a request authenticated through the local `x-user-id` bypass.
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header("x-user-id", id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }
}

/// Parses the body as JSON; empty bodies come back as `Value::Null`.
pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }
}

pub async fn role_id(repo: &RepositoryState, name: &str) -> i64 {
    repo.list_roles()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("seeded role {name} should exist"))
        .id
}

/// Creates an active user holding the named seeded roles.
pub async fn create_user_with_roles(repo: &RepositoryState, username: &str, roles: &[&str]) -> User {
    let mut role_ids = Vec::new();
    for name in roles {
        role_ids.push(role_id(repo, name).await);
    }
    let request = CreateUserRequest {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        full_name: format!("{username} Test"),
        password: PASSWORD.to_string(),
        role_ids,
    };
    let hash = hash_password(PASSWORD).unwrap();
    repo.create_user(&request, &hash).await.unwrap()
}

/// Builds a multipart body with a single `file` field.
pub fn multipart_upload(uri: &str, user_id: i64, filename: &str, csv: &str) -> Request<Body> {
    let boundary = "admin-portal-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}
