use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: identity, persistence, configuration, errors.
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod repository;

// Domain logic that does not belong to a single handler.
pub mod csv_import;
pub mod workflow;

pub mod handlers;

// One router per resource group.
pub mod routes;
use auth::AuthUser;
use routes::{
    feature_requests::feature_request_routes, logging::logging_routes, public::public_routes,
    question_bank::question_bank_routes, role_management::role_management_routes,
    session::session_routes, user_management::user_management_routes,
};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{RepositoryState, SqliteRepository};

/// ApiDoc
///
/// The OpenAPI document, served at `/api-docs/openapi.json` and rendered by the
/// Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::refresh, handlers::auth::logout,
        handlers::auth::me,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::assign_roles, handlers::users::delete_user,
        handlers::employees::list_employees, handlers::employees::get_employee,
        handlers::employees::create_employee, handlers::employees::update_employee,
        handlers::employees::delete_employee, handlers::employees::employee_template,
        handlers::employees::bulk_upload_employees,
        handlers::roles::list_roles, handlers::roles::get_role, handlers::roles::create_role,
        handlers::roles::update_role, handlers::roles::set_role_permissions,
        handlers::roles::delete_role, handlers::roles::list_permissions,
        handlers::questions::list_questions, handlers::questions::get_question,
        handlers::questions::create_question, handlers::questions::update_question,
        handlers::questions::delete_question, handlers::questions::change_status,
        handlers::questions::list_transitions, handlers::questions::status_history,
        handlers::questions::list_comments, handlers::questions::add_comment,
        handlers::questions::list_statuses, handlers::questions::question_template,
        handlers::questions::bulk_upload_questions,
        handlers::feature_requests::list_feature_requests,
        handlers::feature_requests::get_feature_request,
        handlers::feature_requests::create_feature_request,
        handlers::feature_requests::update_feature_request,
        handlers::feature_requests::delete_feature_request,
        handlers::feature_requests::vote_feature_request,
        handlers::activity::list_activity, handlers::activity::create_activity,
    ),
    components(
        schemas(
            error::FieldError, handlers::CsvUpload,
            models::User, models::UserWithRoles, models::Profile, models::CreateUserRequest,
            models::UpdateUserRequest, models::AssignRolesRequest, models::LoginRequest,
            models::RefreshRequest, models::TokenResponse,
            models::Role, models::Permission, models::RoleWithPermissions,
            models::CreateRoleRequest, models::UpdateRoleRequest, models::SetPermissionsRequest,
            models::Employee, models::CreateEmployeeRequest, models::UpdateEmployeeRequest,
            models::BulkUploadSummary, models::RowFailure,
            models::Question, models::QuestionType, models::Difficulty, models::QuestionStatus,
            models::QuestionStatusInfo, models::CreateQuestionRequest,
            models::UpdateQuestionRequest, models::StatusChangeRequest, models::QuestionComment,
            models::CreateCommentRequest, models::StatusHistoryEntry,
            models::FeatureRequest, models::FeatureRequestStatus, models::CreateFeatureRequest,
            models::UpdateFeatureRequest, models::VoteType, models::VoteRequest,
            models::VoteOutcome,
            models::ActivityLog, models::CreateActivityRequest,
        )
    ),
    tags(
        (name = "admin-portal", description = "Admin Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container handed to every handler: the repository and the
/// immutable configuration.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer, behind the `Repository` trait object.
    pub repo: RepositoryState,
    /// Configuration loaded once at startup.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets the `AuthUser` extractor pull only what it needs from the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects unauthenticated requests with 401 before routing reaches a protected
/// handler. Permission checks stay in the handlers.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles every router, the authentication layer for the protected groups, the
/// request-id and tracing layers, and CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = Router::new()
        .nest("/api/auth", session_routes())
        .nest("/api/user_management", user_management_routes())
        .nest("/api/role_management", role_management_routes())
        .nest("/api/question_bank", question_bank_routes())
        .nest("/api/feature_requests", feature_request_routes())
        .nest("/api/logging", logging_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public_routes())
        .merge(protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` assigned above so every log
/// line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
