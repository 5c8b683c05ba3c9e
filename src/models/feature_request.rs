use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum FeatureRequestStatus {
    #[default]
    Open,
    Planned,
    InProgress,
    Completed,
    Declined,
}

impl FeatureRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureRequestStatus::Open => "open",
            FeatureRequestStatus::Planned => "planned",
            FeatureRequestStatus::InProgress => "in_progress",
            FeatureRequestStatus::Completed => "completed",
            FeatureRequestStatus::Declined => "declined",
        }
    }
}

/// FeatureRequest
///
/// `upvotes`/`downvotes` are denormalized counters maintained by the vote toggle.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct FeatureRequest {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: FeatureRequestStatus,
    pub created_by: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateFeatureRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "description is required"))]
    pub description: String,
}

/// UpdateFeatureRequest
///
/// Changing `status` requires the `feature_requests:manage` permission.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateFeatureRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 5000, message = "description must not be empty"))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FeatureRequestStatus>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    /// The counter column this vote type maintains.
    pub fn counter_column(&self) -> &'static str {
        match self {
            VoteType::Up => "upvotes",
            VoteType::Down => "downvotes",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

/// VoteOutcome
///
/// Counters after the toggle, plus the caller's vote (`null` once toggled off).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct VoteOutcome {
    pub feature_request_id: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<VoteType>,
}
