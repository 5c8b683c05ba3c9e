use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, types::Json};

use super::{DbResult, SqliteRepository};
use crate::models::{
    CreateQuestionRequest, Difficulty, Question, QuestionComment, QuestionStatus,
    QuestionStatusInfo, StatusHistoryEntry,
};

const QUESTION_COLUMNS: &str = "id, question_text, question_type, options, correct_answer, \
     subject, difficulty, status, created_by, reviewed_by, reviewed_at, created_at, updated_at";

/// QuestionFilter
///
/// Query parameters for `GET /api/question_bank/questions`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct QuestionFilter {
    pub status: Option<QuestionStatus>,
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_by: Option<i64>,
    /// Case-insensitive substring match on the question text.
    pub search: Option<String>,
}

/// QuestionRepository
///
/// The question bank, its review comments, and the status workflow tables.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn list_questions(&self, filter: &QuestionFilter) -> DbResult<Vec<Question>>;
    async fn get_question(&self, id: i64) -> DbResult<Option<Question>>;
    // New questions always start in `draft`.
    async fn create_question(&self, req: &CreateQuestionRequest, author: i64) -> DbResult<Question>;
    // Writes the content fields of `merged`, but only while the stored status still equals
    // `merged.status`. Returns None if the row is gone or its status moved.
    async fn update_question_content(&self, merged: &Question) -> DbResult<Option<Question>>;
    async fn delete_question(&self, id: i64) -> DbResult<bool>;

    // --- Workflow ---
    async fn list_statuses(&self) -> DbResult<Vec<QuestionStatusInfo>>;
    // True when any of `role_ids` has a (from, to, role) row in the transitions table.
    async fn transition_allowed(
        &self,
        from: QuestionStatus,
        to: QuestionStatus,
        role_ids: &[i64],
    ) -> DbResult<bool>;
    async fn allowed_targets(
        &self,
        from: QuestionStatus,
        role_ids: &[i64],
    ) -> DbResult<Vec<QuestionStatus>>;
    // Moves the question from `from` to `to`, records history, optionally stores a review
    // comment. Returns None when the stored status is no longer `from`.
    async fn apply_transition(
        &self,
        id: i64,
        from: QuestionStatus,
        to: QuestionStatus,
        actor: i64,
        comment: Option<&str>,
    ) -> DbResult<Option<Question>>;
    async fn status_history(&self, question_id: i64) -> DbResult<Vec<StatusHistoryEntry>>;

    // --- Comments ---
    async fn add_comment(&self, question_id: i64, user_id: i64, text: &str)
    -> DbResult<QuestionComment>;
    async fn list_comments(&self, question_id: i64) -> DbResult<Vec<QuestionComment>>;
}

fn push_role_ids(builder: &mut QueryBuilder<'_, Sqlite>, role_ids: &[i64]) {
    builder.push(" AND role_id IN (");
    let mut separated = builder.separated(", ");
    for id in role_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Escapes `%`, `_` and the escape character itself so the text matches literally
/// inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl QuestionRepository for SqliteRepository {
    /// list_questions
    ///
    /// Composes the optional filters with `QueryBuilder` so every value is bound.
    async fn list_questions(&self, filter: &QuestionFilter) -> DbResult<Vec<Question>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE 1 = 1"));

        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(subject) = &filter.subject {
            builder.push(" AND subject = ");
            builder.push_bind(subject.clone());
        }
        if let Some(difficulty) = filter.difficulty {
            builder.push(" AND difficulty = ");
            builder.push_bind(difficulty);
        }
        if let Some(author) = filter.created_by {
            builder.push(" AND created_by = ");
            builder.push_bind(author);
        }
        if let Some(search) = &filter.search {
            builder.push(" AND question_text LIKE ");
            builder.push_bind(format!("%{}%", escape_like(search)));
            builder.push(" ESCAPE '\\'");
        }

        builder.push(" ORDER BY updated_at DESC, id DESC");

        builder
            .build_query_as::<Question>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_question(&self, id: i64) -> DbResult<Option<Question>> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?");
        sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_question(&self, req: &CreateQuestionRequest, author: i64) -> DbResult<Question> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO questions
                (question_text, question_type, options, correct_answer, subject, difficulty,
                 status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'draft', ?, ?, ?)
            RETURNING {QUESTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Question>(&sql)
            .bind(&req.question_text)
            .bind(req.question_type)
            .bind(Json(req.options.clone()))
            .bind(&req.correct_answer)
            .bind(req.subject.trim())
            .bind(req.difficulty)
            .bind(author)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_question_content(&self, merged: &Question) -> DbResult<Option<Question>> {
        let sql = format!(
            r#"
            UPDATE questions
            SET question_text = ?,
                question_type = ?,
                options = ?,
                correct_answer = ?,
                subject = ?,
                difficulty = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {QUESTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Question>(&sql)
            .bind(&merged.question_text)
            .bind(merged.question_type)
            .bind(&merged.options)
            .bind(&merged.correct_answer)
            .bind(&merged.subject)
            .bind(merged.difficulty)
            .bind(Utc::now())
            .bind(merged.id)
            .bind(merged.status.as_str())
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_question(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_statuses(&self) -> DbResult<Vec<QuestionStatusInfo>> {
        // Workflow order, not alphabetical.
        sqlx::query_as::<_, QuestionStatusInfo>(
            r#"
            SELECT name, description FROM question_statuses
            ORDER BY CASE name
                WHEN 'draft' THEN 0
                WHEN 'pending_review' THEN 1
                WHEN 'needs_revision' THEN 2
                WHEN 'approved' THEN 3
                WHEN 'rejected' THEN 4
                ELSE 5
            END
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn transition_allowed(
        &self,
        from: QuestionStatus,
        to: QuestionStatus,
        role_ids: &[i64],
    ) -> DbResult<bool> {
        if role_ids.is_empty() {
            return Ok(false);
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM question_status_transitions WHERE from_status = ",
        );
        builder.push_bind(from.as_str());
        builder.push(" AND to_status = ");
        builder.push_bind(to.as_str());
        push_role_ids(&mut builder, role_ids);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn allowed_targets(
        &self,
        from: QuestionStatus,
        role_ids: &[i64],
    ) -> DbResult<Vec<QuestionStatus>> {
        if role_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT to_status FROM question_status_transitions WHERE from_status = ",
        );
        builder.push_bind(from.as_str());
        push_role_ids(&mut builder, role_ids);
        builder.push(" ORDER BY to_status");

        builder
            .build_query_scalar::<QuestionStatus>()
            .fetch_all(&self.pool)
            .await
    }

    /// apply_transition
    ///
    /// The status update is conditional on `from`, so two reviewers acting on the same
    /// question cannot both succeed; the loser sees `None`.
    async fn apply_transition(
        &self,
        id: i64,
        from: QuestionStatus,
        to: QuestionStatus,
        actor: i64,
        comment: Option<&str>,
    ) -> DbResult<Option<Question>> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;

        let sql = if to.is_review_outcome() {
            format!(
                "UPDATE questions SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ? \
                 WHERE id = ? AND status = ? RETURNING {QUESTION_COLUMNS}"
            )
        } else {
            format!(
                "UPDATE questions SET status = ?, updated_at = ? \
                 WHERE id = ? AND status = ? RETURNING {QUESTION_COLUMNS}"
            )
        };

        let mut query = sqlx::query_as::<_, Question>(&sql).bind(to.as_str());
        if to.is_review_outcome() {
            query = query.bind(actor).bind(now);
        }
        let updated = query
            .bind(now)
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(question) = updated else {
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO question_status_history (question_id, from_status, to_status, changed_by, changed_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(actor)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(text) = comment {
            sqlx::query(
                "INSERT INTO question_comments (question_id, user_id, comment, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(actor)
            .bind(text)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(question))
    }

    async fn status_history(&self, question_id: i64) -> DbResult<Vec<StatusHistoryEntry>> {
        sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT id, question_id, from_status, to_status, changed_by, changed_at
            FROM question_status_history
            WHERE question_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
    }

    /// add_comment
    ///
    /// Inserts the comment, then reads it back joined with `users` for the author's
    /// username.
    async fn add_comment(
        &self,
        question_id: i64,
        user_id: i64,
        text: &str,
    ) -> DbResult<QuestionComment> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO question_comments (question_id, user_id, comment, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(question_id)
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        sqlx::query_as::<_, QuestionComment>(
            r#"
            SELECT c.id, c.question_id, c.user_id, c.comment, c.created_at, u.username AS author_username
            FROM question_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_comments(&self, question_id: i64) -> DbResult<Vec<QuestionComment>> {
        sqlx::query_as::<_, QuestionComment>(
            r#"
            SELECT c.id, c.question_id, c.user_id, c.comment, c.created_at, u.username AS author_username
            FROM question_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.question_id = ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
    }
}
