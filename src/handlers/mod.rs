//! HTTP handlers, one module per resource group. Each handler authenticates through
//! the `AuthUser` extractor, checks a static permission string, then talks to the
//! repository. Successful mutations are written to the activity log.

use axum::{
    body::Body,
    extract::Multipart,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::NewActivity,
    repository::{ActivityRepository, RepositoryState},
};

pub mod activity;
pub mod auth;
pub mod employees;
pub mod feature_requests;
pub mod questions;
pub mod roles;
pub mod users;

/// CsvUpload
///
/// OpenAPI shape of the multipart bulk-upload body. The handlers read it with
/// [`read_upload`].
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct CsvUpload {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// record_activity
///
/// Writes an audit row. The surrounding request has already succeeded, so a failed
/// write is logged and swallowed.
pub async fn record_activity(repo: &RepositoryState, entry: NewActivity) {
    if let Err(e) = repo.log_activity(&entry).await {
        tracing::warn!(
            error = %e,
            action = %entry.action,
            entity_type = %entry.entity_type,
            "Failed to record activity"
        );
    }
}

/// Serves `body` as a downloadable CSV file.
pub fn csv_attachment(filename: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from(body),
    )
        .into_response()
}

/// read_upload
///
/// Pulls the bytes of the `file` field out of a multipart body. Other fields are
/// ignored; a missing or empty file is a 400.
pub async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read uploaded file: {e}")))?;
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        return Ok(data.to_vec());
    }
    Err(AppError::BadRequest(
        "Multipart field 'file' is required".to_string(),
    ))
}
