use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        // Revokes every refresh token of the caller.
        .route("/logout", post(handlers::auth::logout))
        // Caller profile with role names and effective permissions.
        .route("/me", get(handlers::auth::me))
}
