use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::record_activity;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, FieldError, is_unique_violation},
    extract::ValidatedJson,
    models::{
        CreateRoleRequest, NewActivity, Permission, Role, RoleWithPermissions,
        SetPermissionsRequest, UpdateRoleRequest,
    },
    repository::{RepositoryState, RoleDeletion, RoleRepository},
};

fn role_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Role {id}"))
}

fn map_unique(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Role name already exists".to_string())
    } else {
        err.into()
    }
}

async fn checked_permission_ids(repo: &RepositoryState, ids: &[i64]) -> AppResult<Vec<i64>> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let found = repo.find_permissions_by_ids(&unique).await?;
    if found.len() != unique.len() {
        return Err(AppError::Validation(vec![FieldError::new(
            "permission_ids",
            "one or more permission ids do not exist",
        )]));
    }
    Ok(unique)
}

async fn detailed(repo: &RepositoryState, role: Role) -> AppResult<RoleWithPermissions> {
    let permissions = repo.role_permissions(role.id).await?;
    let user_count = repo.role_user_count(role.id).await?;
    Ok(RoleWithPermissions {
        role,
        permissions,
        user_count,
    })
}

/// list_roles
///
/// [roles:read] Every role with its permissions and active user count.
#[utoipa::path(
    get,
    path = "/api/role_management/roles",
    responses((status = 200, description = "Roles", body = [RoleWithPermissions]))
)]
pub async fn list_roles(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<RoleWithPermissions>>> {
    user.require("roles:read")?;
    let roles = state.repo.list_roles().await?;

    let mut out = Vec::with_capacity(roles.len());
    for role in roles {
        out.push(detailed(&state.repo, role).await?);
    }
    Ok(Json(out))
}

#[utoipa::path(
    get,
    path = "/api/role_management/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role", body = RoleWithPermissions),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RoleWithPermissions>> {
    user.require("roles:read")?;
    let role = state.repo.get_role(id).await?.ok_or_else(|| role_not_found(id))?;
    Ok(Json(detailed(&state.repo, role).await?))
}

/// create_role
///
/// [roles:write] Role names are unique; a duplicate is a 409.
#[utoipa::path(
    post,
    path = "/api/role_management/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = RoleWithPermissions),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn create_role(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(mut payload): ValidatedJson<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<RoleWithPermissions>)> {
    user.require("roles:write")?;
    payload.permission_ids = checked_permission_ids(&state.repo, &payload.permission_ids).await?;

    let role = state.repo.create_role(&payload).await.map_err(map_unique)?;

    tracing::info!(role_id = role.id, name = %role.name, "Role created");
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "create", "role", Some(role.id))
            .details(format!("name={}", role.name)),
    )
    .await;
    Ok((StatusCode::CREATED, Json(detailed(&state.repo, role).await?)))
}

#[utoipa::path(
    put,
    path = "/api/role_management/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = RoleWithPermissions),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn update_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateRoleRequest>,
) -> AppResult<Json<RoleWithPermissions>> {
    user.require("roles:write")?;
    let role = state
        .repo
        .update_role(id, &payload)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| role_not_found(id))?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "update", "role", Some(id)),
    )
    .await;
    Ok(Json(detailed(&state.repo, role).await?))
}

/// set_role_permissions
///
/// [roles:write] Replaces the role's permission set in one transaction.
#[utoipa::path(
    put,
    path = "/api/role_management/roles/{id}/permissions",
    params(("id" = i64, Path, description = "Role ID")),
    request_body = SetPermissionsRequest,
    responses(
        (status = 200, description = "Permissions replaced", body = RoleWithPermissions),
        (status = 400, description = "Unknown permission id"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_role_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<SetPermissionsRequest>,
) -> AppResult<Json<RoleWithPermissions>> {
    user.require("roles:write")?;
    let role = state.repo.get_role(id).await?.ok_or_else(|| role_not_found(id))?;
    let permission_ids = checked_permission_ids(&state.repo, &payload.permission_ids).await?;

    state.repo.set_role_permissions(id, &permission_ids).await?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "set_permissions", "role", Some(id))
            .details(format!("permission_count={}", permission_ids.len())),
    )
    .await;
    Ok(Json(detailed(&state.repo, role).await?))
}

/// delete_role
///
/// [roles:delete] Refuses with 409 while any user actively holds the role.
#[utoipa::path(
    delete,
    path = "/api/role_management/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Role still assigned to users")
    )
)]
pub async fn delete_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require("roles:delete")?;
    match state.repo.delete_role(id).await? {
        RoleDeletion::Deleted => {
            record_activity(
                &state.repo,
                NewActivity::new(user.id, "delete", "role", Some(id)),
            )
            .await;
            Ok(StatusCode::NO_CONTENT)
        }
        RoleDeletion::NotFound => Err(role_not_found(id)),
        RoleDeletion::InUse(count) => Err(AppError::Conflict(format!(
            "Role is assigned to {count} user(s); unassign it before deleting"
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/api/role_management/permissions",
    responses((status = 200, description = "Permission catalogue", body = [Permission]))
)]
pub async fn list_permissions(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Permission>>> {
    user.require("roles:read")?;
    Ok(Json(state.repo.list_permissions().await?))
}
