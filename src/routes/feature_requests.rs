use crate::{AppState, handlers::feature_requests as fr};
use axum::{
    Router,
    routing::{get, post},
};

/// Mounted at `/api/feature_requests`.
pub fn feature_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(fr::list_feature_requests).post(fr::create_feature_request),
        )
        .route(
            "/{id}",
            get(fr::get_feature_request)
                .put(fr::update_feature_request)
                .delete(fr::delete_feature_request),
        )
        // POST /{id}/vote
        // Up/down toggle; the response carries the new counters.
        .route("/{id}/vote", post(fr::vote_feature_request))
}
