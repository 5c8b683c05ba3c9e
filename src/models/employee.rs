use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    #[ts(type = "string | null")]
    pub date_of_joining: Option<NaiveDate>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateEmployeeRequest
///
/// Payload for `POST /api/user_management/employees`, and the shape every CSV row is
/// parsed into during bulk upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 32, message = "employee_code must be 1-32 characters"))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 100, message = "first_name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last_name is required"))]
    pub last_name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    #[ts(type = "string | null")]
    pub date_of_joining: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateEmployeeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "first_name must not be empty"))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "last_name must not be empty"))]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub date_of_joining: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// RowFailure
///
/// A CSV line that was not imported. `line` is 1-based and counts the header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct RowFailure {
    pub line: usize,
    pub error: String,
}

/// BulkUploadSummary
///
/// Result of a CSV bulk upload. Valid rows are committed even when others fail.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BulkUploadSummary {
    pub total: usize,
    pub inserted: usize,
    pub failed: Vec<RowFailure>,
}
