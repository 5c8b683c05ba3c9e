use crate::{
    auth::hash_password,
    config::BootstrapAdmin,
    error::{AppError, AppResult},
    models::{CreateUserRequest, UpdateUserRequest},
    repository::{RepositoryState, RoleRepository, UserRepository},
};

const ADMIN_ROLE: &str = "admin";

/// ensure_admin
///
/// Makes sure at least one active user holds the `admin` role. When none does, the
/// configured account is created, or re-activated and given the role if the
/// username already exists. Returns the id of the account it touched, if any.
pub async fn ensure_admin(
    repo: &RepositoryState,
    admin: &BootstrapAdmin,
) -> AppResult<Option<i64>> {
    if repo.count_active_users_with_role(ADMIN_ROLE).await? > 0 {
        return Ok(None);
    }

    let role = repo
        .list_roles()
        .await?
        .into_iter()
        .find(|r| r.name == ADMIN_ROLE)
        .ok_or_else(|| AppError::Internal("the admin role is missing from the database".to_string()))?;

    if let Some(existing) = repo.find_credentials(&admin.username).await? {
        let mut role_ids: Vec<i64> = repo
            .user_roles(existing.id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        role_ids.push(role.id);
        repo.set_user_roles(existing.id, &role_ids).await?;

        let reactivate = UpdateUserRequest {
            is_active: Some(true),
            ..Default::default()
        };
        repo.update_user(existing.id, &reactivate, None).await?;

        tracing::warn!(
            user_id = existing.id,
            username = %admin.username,
            "No active administrator found; restored admin role on existing account"
        );
        return Ok(Some(existing.id));
    }

    let request = CreateUserRequest {
        username: admin.username.clone(),
        email: admin.email.clone(),
        full_name: "Administrator".to_string(),
        password: admin.password.clone(),
        role_ids: vec![role.id],
    };
    let hash = hash_password(&request.password)?;
    let user = repo.create_user(&request, &hash).await?;

    tracing::warn!(
        user_id = user.id,
        username = %user.username,
        "No active administrator found; created bootstrap admin account"
    );
    Ok(Some(user.id))
}
