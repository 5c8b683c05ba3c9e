use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: the health check and the two calls that
/// hand tokens out.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Username or email plus password in, access and refresh token out.
        .route("/api/auth/login", post(handlers::auth::login))
        // POST /api/auth/refresh
        // Single-use refresh token in, a new pair out.
        .route("/api/auth/refresh", post(handlers::auth::refresh))
}
