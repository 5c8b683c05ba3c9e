use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
};

use super::{CsvUpload, csv_attachment, read_upload, record_activity};
use crate::{
    AppState,
    auth::AuthUser,
    csv_import::{self, QUESTION_HEADER},
    error::{AppError, AppResult},
    extract::ValidatedJson,
    models::{
        BulkUploadSummary, CreateCommentRequest, CreateQuestionRequest, NewActivity, Question,
        QuestionComment, QuestionStatus, QuestionStatusInfo, RowFailure, StatusChangeRequest,
        StatusHistoryEntry, UpdateQuestionRequest, question::shape_errors,
    },
    repository::{QuestionFilter, QuestionRepository, RepositoryState},
    workflow,
};

async fn load_question(repo: &RepositoryState, id: i64) -> AppResult<Question> {
    repo.get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question {id}")))
}

/// list_questions
///
/// [questions:read] Filters by `status`, `subject`, `difficulty`, `created_by` and a
/// free-text `search`, newest first.
#[utoipa::path(
    get,
    path = "/api/question_bank/questions",
    params(QuestionFilter),
    responses((status = 200, description = "Questions", body = [Question]))
)]
pub async fn list_questions(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<QuestionFilter>,
) -> AppResult<Json<Vec<Question>>> {
    user.require("questions:read")?;
    Ok(Json(state.repo.list_questions(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/question_bank/questions/{id}",
    params(("id" = i64, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question", body = Question),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Question>> {
    user.require("questions:read")?;
    Ok(Json(load_question(&state.repo, id).await?))
}

/// create_question
///
/// [questions:write] New questions start in `draft`, authored by the caller.
#[utoipa::path(
    post,
    path = "/api/question_bank/questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Created", body = Question),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_question(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateQuestionRequest>,
) -> AppResult<(StatusCode, Json<Question>)> {
    user.require("questions:write")?;
    let shape = payload.shape_errors();
    if !shape.is_empty() {
        return Err(AppError::Validation(shape));
    }

    let question = state.repo.create_question(&payload, user.id).await?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "create", "question", Some(question.id)),
    )
    .await;
    Ok((StatusCode::CREATED, Json(question)))
}

/// update_question
///
/// [questions:write] Partial content update by the author (or a `questions:manage`
/// holder), only while the question is `draft` or `needs_revision`. The merged result
/// is re-validated as a whole.
#[utoipa::path(
    put,
    path = "/api/question_bank/questions/{id}",
    params(("id" = i64, Path, description = "Question ID")),
    request_body = UpdateQuestionRequest,
    responses(
        (status = 200, description = "Updated", body = Question),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Status does not allow edits")
    )
)]
pub async fn update_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateQuestionRequest>,
) -> AppResult<Json<Question>> {
    user.require("questions:write")?;
    let current = load_question(&state.repo, id).await?;
    workflow::ensure_editable(&current, &user)?;

    let merged = payload.merged_with(&current);
    let shape = shape_errors(
        merged.question_type,
        &merged.options,
        &merged.correct_answer,
    );
    if !shape.is_empty() {
        return Err(AppError::Validation(shape));
    }

    let updated = state
        .repo
        .update_question_content(&merged)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Question status changed concurrently; reload and retry".to_string())
        })?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "update", "question", Some(id)),
    )
    .await;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/question_bank/questions/{id}",
    params(("id" = i64, Path, description = "Question ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require("questions:delete")?;
    if !state.repo.delete_question(id).await? {
        return Err(AppError::NotFound(format!("Question {id}")));
    }
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "delete", "question", Some(id)),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// change_status
///
/// [questions:read + transition table] Moves the question through the review
/// workflow. See [`workflow::change_status`] for the rules.
#[utoipa::path(
    patch,
    path = "/api/question_bank/questions/{id}/status",
    params(("id" = i64, Path, description = "Question ID")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = Question),
        (status = 400, description = "Already in that status"),
        (status = 403, description = "Transition not allowed for the caller's roles"),
        (status = 409, description = "Status changed concurrently")
    )
)]
pub async fn change_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<StatusChangeRequest>,
) -> AppResult<Json<Question>> {
    user.require("questions:read")?;
    let question = load_question(&state.repo, id).await?;
    let from = question.status;

    let updated = workflow::change_status(
        &state.repo,
        &question,
        payload.status,
        &user,
        payload.comment.as_deref(),
    )
    .await?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "status_change", "question", Some(id))
            .details(format!("{from} -> {}", updated.status)),
    )
    .await;
    Ok(Json(updated))
}

/// list_transitions
///
/// [questions:read] Target statuses the caller may move this question to.
#[utoipa::path(
    get,
    path = "/api/question_bank/questions/{id}/transitions",
    params(("id" = i64, Path, description = "Question ID")),
    responses((status = 200, description = "Allowed targets", body = [QuestionStatus]))
)]
pub async fn list_transitions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<QuestionStatus>>> {
    user.require("questions:read")?;
    let question = load_question(&state.repo, id).await?;
    Ok(Json(
        workflow::available_targets(&state.repo, &question, &user).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/question_bank/questions/{id}/history",
    params(("id" = i64, Path, description = "Question ID")),
    responses((status = 200, description = "Accepted transitions, oldest first", body = [StatusHistoryEntry]))
)]
pub async fn status_history(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<StatusHistoryEntry>>> {
    user.require("questions:read")?;
    load_question(&state.repo, id).await?;
    Ok(Json(state.repo.status_history(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/question_bank/questions/{id}/comments",
    params(("id" = i64, Path, description = "Question ID")),
    responses((status = 200, description = "Review comments", body = [QuestionComment]))
)]
pub async fn list_comments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<QuestionComment>>> {
    user.require("questions:read")?;
    load_question(&state.repo, id).await?;
    Ok(Json(state.repo.list_comments(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/question_bank/questions/{id}/comments",
    params(("id" = i64, Path, description = "Question ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = QuestionComment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<QuestionComment>)> {
    user.require("questions:write")?;
    load_question(&state.repo, id).await?;

    let comment = state
        .repo
        .add_comment(id, user.id, payload.comment.trim())
        .await?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "comment", "question", Some(id)),
    )
    .await;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/question_bank/statuses",
    responses((status = 200, description = "Workflow statuses", body = [QuestionStatusInfo]))
)]
pub async fn list_statuses(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<QuestionStatusInfo>>> {
    user.require("questions:read")?;
    Ok(Json(state.repo.list_statuses().await?))
}

#[utoipa::path(
    get,
    path = "/api/question_bank/questions/template",
    responses((status = 200, description = "CSV template", content_type = "text/csv", body = String))
)]
pub async fn question_template(user: AuthUser) -> AppResult<Response> {
    user.require("questions:read")?;
    Ok(csv_attachment(
        "questions_template.csv",
        csv_import::template(&QUESTION_HEADER),
    ))
}

/// bulk_upload_questions
///
/// [questions:write] Imports questions from a CSV (multipart field `file`). Options
/// are `|`-separated. Imported questions start in `draft`, authored by the uploader.
#[utoipa::path(
    post,
    path = "/api/question_bank/questions/bulk_upload",
    request_body(content = CsvUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import summary", body = BulkUploadSummary),
        (status = 400, description = "Missing file or wrong header")
    )
)]
pub async fn bulk_upload_questions(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<BulkUploadSummary>> {
    user.require("questions:write")?;
    let data = read_upload(multipart).await?;
    let rows = csv_import::parse_csv(&data, &QUESTION_HEADER)?;

    let mut summary = BulkUploadSummary {
        total: rows.len(),
        ..Default::default()
    };

    for row in &rows {
        let req = match csv_import::question_from_row(row) {
            Ok(req) => req,
            Err(error) => {
                summary.failed.push(RowFailure { line: row.line, error });
                continue;
            }
        };
        match state.repo.create_question(&req, user.id).await {
            Ok(_) => summary.inserted += 1,
            // Constraint and trigger rejections belong to the row; pool or I/O failures
            // abort the import.
            Err(sqlx::Error::Database(db)) => {
                tracing::warn!(line = row.line, error = %db, "Question row rejected");
                summary.failed.push(RowFailure {
                    line: row.line,
                    error: format!("rejected by the database: {}", db.message()),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        total = summary.total,
        inserted = summary.inserted,
        failed = summary.failed.len(),
        "Question bulk upload finished"
    );
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "bulk_upload", "question", None).details(format!(
            "total={} inserted={} failed={}",
            summary.total,
            summary.inserted,
            summary.failed.len()
        )),
    )
    .await;
    Ok(Json(summary))
}
