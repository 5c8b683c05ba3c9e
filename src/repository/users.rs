use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DbResult, SqliteRepository};
use crate::models::{
    CreateUserRequest, RefreshTokenRecord, Role, UpdateUserRequest, User, UserCredentials,
};

const USER_COLUMNS: &str =
    "id, username, email, full_name, is_active, last_login_at, created_at, updated_at";

/// UserRepository
///
/// Users, their role links and their refresh tokens.
#[async_trait]
pub trait UserRepository: Send + Sync {
    // --- Retrieval ---
    // Inactive (soft-deleted) users are only listed when asked for.
    async fn list_users(&self, include_inactive: bool) -> DbResult<Vec<User>>;
    async fn get_user(&self, id: i64) -> DbResult<Option<User>>;
    // Looks the identifier up as a username first, then as an email.
    async fn find_credentials(&self, identifier: &str) -> DbResult<Option<UserCredentials>>;

    // --- Mutation ---
    // Inserts the user and links `req.role_ids` in one transaction.
    async fn create_user(&self, req: &CreateUserRequest, password_hash: &str) -> DbResult<User>;
    async fn update_user(
        &self,
        id: i64,
        req: &UpdateUserRequest,
        password_hash: Option<&str>,
    ) -> DbResult<Option<User>>;
    // Soft delete. Also revokes every refresh token the user holds.
    async fn deactivate_user(&self, id: i64) -> DbResult<bool>;
    async fn record_login(&self, id: i64) -> DbResult<()>;

    // --- Role links ---
    async fn user_roles(&self, user_id: i64) -> DbResult<Vec<Role>>;
    // Union of the permission names of every active role the user holds.
    async fn user_permissions(&self, user_id: i64) -> DbResult<Vec<String>>;
    // Replaces the active role set. Existing links for other roles are deactivated,
    // not deleted, so a user-role pair never gets a second row.
    async fn set_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()>;
    async fn count_active_users_with_role(&self, role_name: &str) -> DbResult<i64>;

    // --- Refresh tokens ---
    async fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()>;
    async fn find_refresh_token(&self, token_hash: &str) -> DbResult<Option<RefreshTokenRecord>>;
    // Returns false if the token was already revoked, so a token can only be spent once.
    async fn revoke_refresh_token(&self, id: i64) -> DbResult<bool>;
    async fn revoke_user_tokens(&self, user_id: i64) -> DbResult<u64>;
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn list_users(&self, include_inactive: bool) -> DbResult<Vec<User>> {
        let sql = if include_inactive {
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY username")
        } else {
            format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY username")
        };
        sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await
    }

    async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_credentials(&self, identifier: &str) -> DbResult<Option<UserCredentials>> {
        sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, password_hash, is_active
            FROM users
            WHERE username = ?1 OR email = ?1
            ORDER BY CASE WHEN username = ?1 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_user(&self, req: &CreateUserRequest, password_hash: &str) -> DbResult<User> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let sql = format!(
            "INSERT INTO users (username, email, full_name, password_hash, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&req.username)
            .bind(&req.email)
            .bind(&req.full_name)
            .bind(password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        for role_id in &req.role_ids {
            sqlx::query(
                "INSERT INTO role_user_link (user_id, role_id, is_active, assigned_at) VALUES (?, ?, 1, ?) \
                 ON CONFLICT (user_id, role_id) DO NOTHING",
            )
            .bind(user.id)
            .bind(role_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    /// update_user
    ///
    /// Uses `COALESCE` so only the fields present in `req` change.
    async fn update_user(
        &self,
        id: i64,
        req: &UpdateUserRequest,
        password_hash: Option<&str>,
    ) -> DbResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                full_name = COALESCE(?, full_name),
                password_hash = COALESCE(?, password_hash),
                is_active = COALESCE(?, is_active),
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&req.email)
            .bind(&req.full_name)
            .bind(password_hash)
            .bind(req.is_active)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn deactivate_user(&self, id: i64) -> DbResult<bool> {
        let mut tx = self.begin_write().await?;
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_roles(&self, user_id: i64) -> DbResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description, r.created_at, r.updated_at
            FROM roles r
            JOIN role_user_link l ON l.role_id = r.id
            WHERE l.user_id = ? AND l.is_active = 1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn user_permissions(&self, user_id: i64) -> DbResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_permission_link rp ON rp.permission_id = p.id
            JOIN role_user_link ru ON ru.role_id = rp.role_id
            WHERE ru.user_id = ? AND ru.is_active = 1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        sqlx::query("UPDATE role_user_link SET is_active = 0 WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in role_ids {
            sqlx::query(
                r#"
                INSERT INTO role_user_link (user_id, role_id, is_active, assigned_at)
                VALUES (?, ?, 1, ?)
                ON CONFLICT (user_id, role_id) DO UPDATE SET
                    is_active = 1,
                    assigned_at = excluded.assigned_at
                "#,
            )
            .bind(user_id)
            .bind(role_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn count_active_users_with_role(&self, role_name: &str) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT u.id)
            FROM users u
            JOIN role_user_link l ON l.user_id = u.id AND l.is_active = 1
            JOIN roles r ON r.id = l.role_id
            WHERE r.name = ? AND u.is_active = 1
            "#,
        )
        .bind(role_name)
        .fetch_one(&self.pool)
        .await
    }

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, revoked, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> DbResult<Option<RefreshTokenRecord>> {
        sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, expires_at, revoked FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    async fn revoke_refresh_token(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_user_tokens(&self, user_id: i64) -> DbResult<u64> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
