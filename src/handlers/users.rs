use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::record_activity;
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::{AppError, AppResult, FieldError, is_unique_violation},
    extract::ValidatedJson,
    models::{
        AssignRolesRequest, CreateUserRequest, NewActivity, UpdateUserRequest, User,
        UserWithRoles,
    },
    repository::{RepositoryState, RoleRepository, UserRepository},
};

/// ListQuery
///
/// Shared `?include_inactive=true` switch for the soft-deleted resources.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

fn user_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User {id}"))
}

/// Deduplicates `ids` and checks that every role exists.
pub(crate) async fn checked_role_ids(repo: &RepositoryState, ids: &[i64]) -> AppResult<Vec<i64>> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let found = repo.find_roles_by_ids(&unique).await?;
    if found.len() != unique.len() {
        let missing: Vec<String> = unique
            .iter()
            .filter(|id| !found.iter().any(|r| r.id == **id))
            .map(|id| id.to_string())
            .collect();
        return Err(AppError::Validation(vec![FieldError::new(
            "role_ids",
            format!("unknown role id(s): {}", missing.join(", ")),
        )]));
    }
    Ok(unique)
}

async fn with_roles(repo: &RepositoryState, user: User) -> AppResult<UserWithRoles> {
    let roles = repo.user_roles(user.id).await?;
    Ok(UserWithRoles { user, roles })
}

fn map_unique(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Username or email already exists".to_string())
    } else {
        err.into()
    }
}

#[utoipa::path(
    get,
    path = "/api/user_management/users",
    params(ListQuery),
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<User>>> {
    user.require("users:read")?;
    Ok(Json(state.repo.list_users(query.include_inactive).await?))
}

#[utoipa::path(
    get,
    path = "/api/user_management/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with roles", body = UserWithRoles),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserWithRoles>> {
    user.require("users:read")?;
    let found = state.repo.get_user(id).await?.ok_or_else(|| user_not_found(id))?;
    Ok(Json(with_roles(&state.repo, found).await?))
}

/// create_user
///
/// [users:write] Creates a login identity and links the requested roles. Duplicate
/// usernames or emails are a 409.
#[utoipa::path(
    post,
    path = "/api/user_management/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserWithRoles),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(mut payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserWithRoles>)> {
    user.require("users:write")?;
    payload.role_ids = checked_role_ids(&state.repo, &payload.role_ids).await?;
    payload.username = payload.username.trim().to_string();

    let hash = hash_password(&payload.password)?;
    let created = state
        .repo
        .create_user(&payload, &hash)
        .await
        .map_err(map_unique)?;

    tracing::info!(user_id = created.id, actor = user.id, "User created");
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "create", "user", Some(created.id))
            .details(format!("username={}", created.username)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(with_roles(&state.repo, created).await?),
    ))
}

/// update_user
///
/// [users:write] Partial update. A new password is re-hashed; setting
/// `is_active=false` also revokes the user's refresh tokens.
#[utoipa::path(
    put,
    path = "/api/user_management/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserWithRoles),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<Json<UserWithRoles>> {
    user.require("users:write")?;
    if id == user.id && payload.is_active == Some(false) {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let hash = match &payload.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let updated = state
        .repo
        .update_user(id, &payload, hash.as_deref())
        .await
        .map_err(map_unique)?
        .ok_or_else(|| user_not_found(id))?;

    if payload.is_active == Some(false) {
        state.repo.revoke_user_tokens(id).await?;
    }

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "update", "user", Some(id)),
    )
    .await;
    Ok(Json(with_roles(&state.repo, updated).await?))
}

/// assign_roles
///
/// [users:write] Replaces the user's active role set. Roles not listed are
/// deactivated on the link table, never deleted.
#[utoipa::path(
    put,
    path = "/api/user_management/users/{id}/roles",
    params(("id" = i64, Path, description = "User ID")),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = UserWithRoles),
        (status = 400, description = "Unknown role id"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn assign_roles(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<AssignRolesRequest>,
) -> AppResult<Json<UserWithRoles>> {
    user.require("users:write")?;
    let target = state.repo.get_user(id).await?.ok_or_else(|| user_not_found(id))?;
    let role_ids = checked_role_ids(&state.repo, &payload.role_ids).await?;

    state.repo.set_user_roles(id, &role_ids).await?;

    let ids: Vec<String> = role_ids.iter().map(|r| r.to_string()).collect();
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "assign_roles", "user", Some(id))
            .details(format!("role_ids=[{}]", ids.join(","))),
    )
    .await;
    Ok(Json(with_roles(&state.repo, target).await?))
}

/// delete_user
///
/// [users:delete] Soft delete. The caller cannot deactivate their own account.
#[utoipa::path(
    delete,
    path = "/api/user_management/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require("users:delete")?;
    if id == user.id {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    if !state.repo.deactivate_user(id).await? {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = id, actor = user.id, "User deactivated");
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "delete", "user", Some(id)),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
