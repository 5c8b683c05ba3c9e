use crate::{AppState, handlers::activity};
use axum::{Router, routing::get};

/// Mounted at `/api/logging`.
pub fn logging_routes() -> Router<AppState> {
    Router::new().route(
        "/activity",
        get(activity::list_activity).post(activity::create_activity),
    )
}
