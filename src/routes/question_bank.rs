use crate::{AppState, handlers::questions};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Question Bank Router
///
/// Mounted at `/api/question_bank`.
pub fn question_bank_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/questions/template", get(questions::question_template))
        .route(
            "/questions/bulk_upload",
            post(questions::bulk_upload_questions),
        )
        .route(
            "/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        // PATCH /questions/{id}/status
        // Workflow move; authorized by the (from, to, role) transition table.
        .route("/questions/{id}/status", patch(questions::change_status))
        // GET /questions/{id}/transitions
        // Targets the caller may pick from the current status.
        .route(
            "/questions/{id}/transitions",
            get(questions::list_transitions),
        )
        .route("/questions/{id}/history", get(questions::status_history))
        .route(
            "/questions/{id}/comments",
            get(questions::list_comments).post(questions::add_comment),
        )
        .route("/statuses", get(questions::list_statuses))
}
