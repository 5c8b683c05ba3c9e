use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppResult,
    extract::{ValidatedJson, client_ip},
    models::{ActivityFilter, ActivityLog, CreateActivityRequest, NewActivity},
    repository::ActivityRepository,
};

/// list_activity
///
/// [logs:read] Newest first. `limit` defaults to 100 and is capped at 500.
#[utoipa::path(
    get,
    path = "/api/logging/activity",
    params(ActivityFilter),
    responses((status = 200, description = "Activity log", body = [ActivityLog]))
)]
pub async fn list_activity(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> AppResult<Json<Vec<ActivityLog>>> {
    user.require("logs:read")?;
    Ok(Json(state.repo.list_activity(&filter).await?))
}

/// create_activity
///
/// [Authenticated Route] Records a client-side event for the caller. Unlike the
/// server-side audit writes, a failure here is returned to the client.
#[utoipa::path(
    post,
    path = "/api/logging/activity",
    request_body = CreateActivityRequest,
    responses((status = 201, description = "Recorded", body = ActivityLog))
)]
pub async fn create_activity(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<CreateActivityRequest>,
) -> AppResult<(StatusCode, Json<ActivityLog>)> {
    let entry = NewActivity {
        user_id: Some(user.id),
        action: payload.action.trim().to_string(),
        entity_type: payload.entity_type.trim().to_string(),
        entity_id: payload.entity_id,
        details: payload.details,
        ip_address: client_ip(&headers),
    };
    let logged = state.repo.log_activity(&entry).await?;
    Ok((StatusCode::CREATED, Json(logged)))
}
