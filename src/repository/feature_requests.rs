use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;

use super::{DbResult, SqliteRepository};
use crate::models::{
    CreateFeatureRequest, FeatureRequest, FeatureRequestStatus, UpdateFeatureRequest,
    VoteOutcome, VoteType,
};

const FEATURE_REQUEST_COLUMNS: &str =
    "id, title, description, status, created_by, upvotes, downvotes, created_at, updated_at";

#[async_trait]
pub trait FeatureRequestRepository: Send + Sync {
    // Ordered by net score, then newest first.
    async fn list_feature_requests(
        &self,
        status: Option<FeatureRequestStatus>,
    ) -> DbResult<Vec<FeatureRequest>>;
    async fn get_feature_request(&self, id: i64) -> DbResult<Option<FeatureRequest>>;
    async fn create_feature_request(
        &self,
        req: &CreateFeatureRequest,
        author: i64,
    ) -> DbResult<FeatureRequest>;
    async fn update_feature_request(
        &self,
        id: i64,
        req: &UpdateFeatureRequest,
    ) -> DbResult<Option<FeatureRequest>>;
    async fn delete_feature_request(&self, id: i64) -> DbResult<bool>;

    /// Toggles the caller's vote and adjusts the counters. Returns None if the feature
    /// request does not exist.
    async fn toggle_vote(
        &self,
        feature_request_id: i64,
        user_id: i64,
        vote: VoteType,
    ) -> DbResult<Option<VoteOutcome>>;
}

/// Adds `delta` to the counter column of `vote`. Counters never go below zero.
async fn bump_counter(
    conn: &mut SqliteConnection,
    feature_request_id: i64,
    vote: VoteType,
    delta: i64,
) -> DbResult<()> {
    let column = vote.counter_column();
    let sql = format!("UPDATE feature_requests SET {column} = MAX(0, {column} + ?) WHERE id = ?");
    sqlx::query(&sql)
        .bind(delta)
        .bind(feature_request_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl FeatureRequestRepository for SqliteRepository {
    async fn list_feature_requests(
        &self,
        status: Option<FeatureRequestStatus>,
    ) -> DbResult<Vec<FeatureRequest>> {
        let order = "ORDER BY (upvotes - downvotes) DESC, created_at DESC, id DESC";
        match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {FEATURE_REQUEST_COLUMNS} FROM feature_requests WHERE status = ? {order}"
                );
                sqlx::query_as::<_, FeatureRequest>(&sql)
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {FEATURE_REQUEST_COLUMNS} FROM feature_requests {order}");
                sqlx::query_as::<_, FeatureRequest>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    async fn get_feature_request(&self, id: i64) -> DbResult<Option<FeatureRequest>> {
        let sql = format!("SELECT {FEATURE_REQUEST_COLUMNS} FROM feature_requests WHERE id = ?");
        sqlx::query_as::<_, FeatureRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_feature_request(
        &self,
        req: &CreateFeatureRequest,
        author: i64,
    ) -> DbResult<FeatureRequest> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO feature_requests (title, description, status, created_by, upvotes, downvotes, created_at, updated_at) \
             VALUES (?, ?, 'open', ?, 0, 0, ?, ?) RETURNING {FEATURE_REQUEST_COLUMNS}"
        );
        sqlx::query_as::<_, FeatureRequest>(&sql)
            .bind(req.title.trim())
            .bind(&req.description)
            .bind(author)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_feature_request(
        &self,
        id: i64,
        req: &UpdateFeatureRequest,
    ) -> DbResult<Option<FeatureRequest>> {
        let sql = format!(
            r#"
            UPDATE feature_requests
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                status = COALESCE(?, status),
                updated_at = ?
            WHERE id = ?
            RETURNING {FEATURE_REQUEST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, FeatureRequest>(&sql)
            .bind(req.title.as_deref().map(str::trim))
            .bind(&req.description)
            .bind(req.status)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_feature_request(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM feature_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// toggle_vote
    ///
    /// - no previous vote: insert it and increment its counter;
    /// - same vote again: remove it and decrement (toggle off);
    /// - opposite vote: switch it, decrement the old counter, increment the new one.
    ///
    /// The read-modify-write runs in one transaction.
    async fn toggle_vote(
        &self,
        feature_request_id: i64,
        user_id: i64,
        vote: VoteType,
    ) -> DbResult<Option<VoteOutcome>> {
        let mut tx = self.begin_write().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM feature_requests WHERE id = ?")
            .bind(feature_request_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let previous = sqlx::query_scalar::<_, VoteType>(
            "SELECT vote_type FROM feature_request_votes WHERE user_id = ? AND feature_request_id = ?",
        )
        .bind(user_id)
        .bind(feature_request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let user_vote = match previous {
            None => {
                sqlx::query(
                    "INSERT INTO feature_request_votes (user_id, feature_request_id, vote_type, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(feature_request_id)
                .bind(vote)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
                bump_counter(&mut tx, feature_request_id, vote, 1).await?;
                Some(vote)
            }
            Some(prev) if prev == vote => {
                sqlx::query(
                    "DELETE FROM feature_request_votes WHERE user_id = ? AND feature_request_id = ?",
                )
                .bind(user_id)
                .bind(feature_request_id)
                .execute(&mut *tx)
                .await?;
                bump_counter(&mut tx, feature_request_id, vote, -1).await?;
                None
            }
            Some(prev) => {
                sqlx::query(
                    "UPDATE feature_request_votes SET vote_type = ? WHERE user_id = ? AND feature_request_id = ?",
                )
                .bind(vote)
                .bind(user_id)
                .bind(feature_request_id)
                .execute(&mut *tx)
                .await?;
                bump_counter(&mut tx, feature_request_id, prev, -1).await?;
                bump_counter(&mut tx, feature_request_id, vote, 1).await?;
                Some(vote)
            }
        };

        let (upvotes, downvotes) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT upvotes, downvotes FROM feature_requests WHERE id = ?",
        )
        .bind(feature_request_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(VoteOutcome {
            feature_request_id,
            upvotes,
            downvotes,
            user_vote,
        }))
    }
}
