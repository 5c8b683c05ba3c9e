use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::record_activity;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{
        CreateFeatureRequest, FeatureRequest, FeatureRequestStatus, NewActivity,
        UpdateFeatureRequest, VoteOutcome, VoteRequest, VoteType,
    },
    repository::{FeatureRequestRepository, RepositoryState},
};

const MANAGE: &str = "feature_requests:manage";

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct FeatureRequestQuery {
    pub status: Option<FeatureRequestStatus>,
}

fn feature_request_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Feature request {id}"))
}

async fn load_feature_request(repo: &RepositoryState, id: i64) -> AppResult<FeatureRequest> {
    repo.get_feature_request(id)
        .await?
        .ok_or_else(|| feature_request_not_found(id))
}

/// list_feature_requests
///
/// [feature_requests:read] Ordered by net votes, then newest first.
#[utoipa::path(
    get,
    path = "/api/feature_requests",
    params(FeatureRequestQuery),
    responses((status = 200, description = "Feature requests", body = [FeatureRequest]))
)]
pub async fn list_feature_requests(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeatureRequestQuery>,
) -> AppResult<Json<Vec<FeatureRequest>>> {
    user.require("feature_requests:read")?;
    Ok(Json(state.repo.list_feature_requests(query.status).await?))
}

#[utoipa::path(
    get,
    path = "/api/feature_requests/{id}",
    params(("id" = i64, Path, description = "Feature request ID")),
    responses(
        (status = 200, description = "Feature request", body = FeatureRequest),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_feature_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<FeatureRequest>> {
    user.require("feature_requests:read")?;
    Ok(Json(load_feature_request(&state.repo, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/feature_requests",
    request_body = CreateFeatureRequest,
    responses((status = 201, description = "Created", body = FeatureRequest))
)]
pub async fn create_feature_request(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateFeatureRequest>,
) -> AppResult<(StatusCode, Json<FeatureRequest>)> {
    user.require("feature_requests:write")?;
    let created = state.repo.create_feature_request(&payload, user.id).await?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "create", "feature_request", Some(created.id)),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_feature_request
///
/// The author (with `feature_requests:write`) may edit title and description.
/// Changing `status`, or editing someone else's request, needs
/// `feature_requests:manage`.
#[utoipa::path(
    put,
    path = "/api/feature_requests/{id}",
    params(("id" = i64, Path, description = "Feature request ID")),
    request_body = UpdateFeatureRequest,
    responses(
        (status = 200, description = "Updated", body = FeatureRequest),
        (status = 403, description = "Not the author, or status change without manage"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_feature_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateFeatureRequest>,
) -> AppResult<Json<FeatureRequest>> {
    let current = load_feature_request(&state.repo, id).await?;

    if payload.status.is_some() || current.created_by != user.id {
        user.require(MANAGE)?;
    } else {
        user.require("feature_requests:write")?;
    }

    let updated = state
        .repo
        .update_feature_request(id, &payload)
        .await?
        .ok_or_else(|| feature_request_not_found(id))?;

    let mut entry = NewActivity::new(user.id, "update", "feature_request", Some(id));
    if let Some(status) = payload.status {
        entry = entry.details(format!("status={}", status.as_str()));
    }
    record_activity(&state.repo, entry).await;
    Ok(Json(updated))
}

/// delete_feature_request
///
/// Allowed for the author or a `feature_requests:manage` holder. Votes go with it.
#[utoipa::path(
    delete,
    path = "/api/feature_requests/{id}",
    params(("id" = i64, Path, description = "Feature request ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_feature_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let current = load_feature_request(&state.repo, id).await?;
    if current.created_by != user.id {
        user.require(MANAGE)?;
    }

    if !state.repo.delete_feature_request(id).await? {
        return Err(feature_request_not_found(id));
    }
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "delete", "feature_request", Some(id)),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// vote_feature_request
///
/// [feature_requests:write] Toggles the caller's vote:
/// - first vote is recorded;
/// - the same vote again removes it;
/// - the opposite vote switches it.
#[utoipa::path(
    post,
    path = "/api/feature_requests/{id}/vote",
    params(("id" = i64, Path, description = "Feature request ID")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Counters after the toggle", body = VoteOutcome),
        (status = 404, description = "Not Found")
    )
)]
pub async fn vote_feature_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<VoteRequest>,
) -> AppResult<Json<VoteOutcome>> {
    user.require("feature_requests:write")?;
    let outcome = state
        .repo
        .toggle_vote(id, user.id, payload.vote_type)
        .await?
        .ok_or_else(|| feature_request_not_found(id))?;

    let detail = match outcome.user_vote {
        Some(VoteType::Up) => "vote=up".to_string(),
        Some(VoteType::Down) => "vote=down".to_string(),
        None => "vote=removed".to_string(),
    };
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "vote", "feature_request", Some(id)).details(detail),
    )
    .await;
    Ok(Json(outcome))
}
