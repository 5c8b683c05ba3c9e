use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{DbResult, SqliteRepository};
use crate::models::{CreateRoleRequest, Permission, Role, UpdateRoleRequest};

const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// RoleDeletion
///
/// Outcome of a delete request. A role with active user links is never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDeletion {
    Deleted,
    NotFound,
    InUse(i64),
}

/// RoleRepository
///
/// Roles, the read-only permission catalogue, and the role-permission links.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list_roles(&self) -> DbResult<Vec<Role>>;
    async fn get_role(&self, id: i64) -> DbResult<Option<Role>>;
    async fn find_roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>>;
    async fn role_permissions(&self, role_id: i64) -> DbResult<Vec<Permission>>;
    // Number of users actively holding the role.
    async fn role_user_count(&self, role_id: i64) -> DbResult<i64>;

    async fn create_role(&self, req: &CreateRoleRequest) -> DbResult<Role>;
    async fn update_role(&self, id: i64, req: &UpdateRoleRequest) -> DbResult<Option<Role>>;
    async fn set_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()>;
    // Checks for active links and deletes in one transaction. Inactive links are
    // history only and are removed with the role.
    async fn delete_role(&self, id: i64) -> DbResult<RoleDeletion>;

    async fn list_permissions(&self) -> DbResult<Vec<Permission>>;
    async fn find_permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>>;
}

async fn replace_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
    permission_ids: &[i64],
) -> DbResult<()> {
    sqlx::query("DELETE FROM role_permission_link WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    for permission_id in permission_ids {
        sqlx::query(
            "INSERT INTO role_permission_link (role_id, permission_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl RoleRepository for SqliteRepository {
    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name");
        sqlx::query_as::<_, Role>(&sql).fetch_all(&self.pool).await
    }

    async fn get_role(&self, id: i64) -> DbResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?");
        sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder
            .build_query_as::<Role>()
            .fetch_all(&self.pool)
            .await
    }

    async fn role_permissions(&self, role_id: i64) -> DbResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.description
            FROM permissions p
            JOIN role_permission_link l ON l.permission_id = p.id
            WHERE l.role_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn role_user_count(&self, role_id: i64) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_user_link WHERE role_id = ? AND is_active = 1",
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_role(&self, req: &CreateRoleRequest) -> DbResult<Role> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let sql = format!(
            "INSERT INTO roles (name, description, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(req.name.trim())
            .bind(&req.description)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        replace_permissions(&mut tx, role.id, &req.permission_ids).await?;

        tx.commit().await?;
        Ok(role)
    }

    async fn update_role(&self, id: i64, req: &UpdateRoleRequest) -> DbResult<Option<Role>> {
        let sql = format!(
            r#"
            UPDATE roles
            SET name = COALESCE(?, name),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ?
            RETURNING {ROLE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Role>(&sql)
            .bind(req.name.as_deref().map(str::trim))
            .bind(&req.description)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()> {
        let mut tx = self.begin_write().await?;
        replace_permissions(&mut tx, role_id, permission_ids).await?;
        sqlx::query("UPDATE roles SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn delete_role(&self, id: i64) -> DbResult<RoleDeletion> {
        let mut tx = self.begin_write().await?;

        let in_use = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_user_link WHERE role_id = ? AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use > 0 {
            return Ok(RoleDeletion::InUse(in_use));
        }

        sqlx::query("DELETE FROM role_user_link WHERE role_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(RoleDeletion::NotFound);
        }

        tx.commit().await?;
        Ok(RoleDeletion::Deleted)
    }

    async fn list_permissions(&self) -> DbResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>("SELECT id, name, description FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    async fn find_permissions_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, description FROM permissions WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder
            .build_query_as::<Permission>()
            .fetch_all(&self.pool)
            .await
    }
}
