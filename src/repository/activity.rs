use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

use super::{DbResult, SqliteRepository};
use crate::models::{ActivityFilter, ActivityLog, NewActivity};

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn log_activity(&self, entry: &NewActivity) -> DbResult<ActivityLog>;
    // Newest first.
    async fn list_activity(&self, filter: &ActivityFilter) -> DbResult<Vec<ActivityLog>>;
}

#[async_trait]
impl ActivityRepository for SqliteRepository {
    async fn log_activity(&self, entry: &NewActivity) -> DbResult<ActivityLog> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT a.id, a.user_id, a.action, a.entity_type, a.entity_id, a.details,
                   a.ip_address, a.created_at, u.username
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_activity(&self, filter: &ActivityFilter) -> DbResult<Vec<ActivityLog>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT a.id, a.user_id, a.action, a.entity_type, a.entity_id, a.details,
                   a.ip_address, a.created_at, u.username
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE 1 = 1
            "#,
        );

        if let Some(user_id) = filter.user_id {
            builder.push(" AND a.user_id = ");
            builder.push_bind(user_id);
        }
        if let Some(action) = &filter.action {
            builder.push(" AND a.action = ");
            builder.push_bind(action.clone());
        }
        if let Some(entity_type) = &filter.entity_type {
            builder.push(" AND a.entity_type = ");
            builder.push_bind(entity_type.clone());
        }

        builder.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ");
        builder.push_bind(filter.effective_limit());

        builder
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await
    }
}
