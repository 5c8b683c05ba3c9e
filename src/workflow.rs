//! Question review workflow.
//!
//! Allowed moves live in the `question_status_transitions` table as
//! (from_status, to_status, role_id) rows. A move is permitted when any of the
//! caller's active roles has a matching row; there is no state machine in code.

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Question, QuestionStatus},
    repository::{QuestionRepository, RepositoryState},
};

/// change_status
///
/// Moves `question` to `target` on behalf of `actor`:
/// - the current status again is a 400;
/// - no transition row for any of the actor's roles is a 403;
/// - a question whose status changed since it was read is a 409.
///
/// On success the history row and the optional review comment are written in the
/// same transaction as the status.
pub async fn change_status(
    repo: &RepositoryState,
    question: &Question,
    target: QuestionStatus,
    actor: &AuthUser,
    comment: Option<&str>,
) -> AppResult<Question> {
    let current = question.status;
    if current == target {
        return Err(AppError::BadRequest(format!(
            "Question is already {current}"
        )));
    }

    if !repo
        .transition_allowed(current, target, &actor.role_ids)
        .await?
    {
        return Err(AppError::Forbidden(format!(
            "Your roles do not allow moving a question from {current} to {target}"
        )));
    }

    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    let updated = repo
        .apply_transition(question.id, current, target, actor.id, comment)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Question status changed concurrently; reload and retry".to_string())
        })?;

    tracing::info!(
        question_id = question.id,
        from = %current,
        to = %target,
        actor = actor.id,
        "Question status changed"
    );
    Ok(updated)
}

/// Statuses the actor may move `question` to from where it is now.
pub async fn available_targets(
    repo: &RepositoryState,
    question: &Question,
    actor: &AuthUser,
) -> AppResult<Vec<QuestionStatus>> {
    Ok(repo
        .allowed_targets(question.status, &actor.role_ids)
        .await?)
}

/// ensure_editable
///
/// Content edits need authorship (or `questions:manage`) and an editable status.
pub fn ensure_editable(question: &Question, actor: &AuthUser) -> AppResult<()> {
    if question.created_by != actor.id && !actor.has("questions:manage") {
        return Err(AppError::Forbidden(
            "Only the author or a question manager can edit this question".to_string(),
        ));
    }
    if !question.status.is_editable() {
        return Err(AppError::Conflict(format!(
            "Questions in status {} cannot be edited",
            question.status
        )));
    }
    Ok(())
}
