use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

/// ActivityLog
///
/// An audit row from `activity_logs`. `user_id` is null for anonymous events such as a
/// failed login and becomes null if the actor is removed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded via a LEFT JOIN on users.
    #[sqlx(default)]
    pub username: Option<String>,
}

/// NewActivity
///
/// Internal insert payload built by handlers after a successful mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewActivity {
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

impl NewActivity {
    pub fn new(user_id: i64, action: &str, entity_type: &str, entity_id: Option<i64>) -> Self {
        Self {
            user_id: Some(user_id),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            ..Default::default()
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

/// CreateActivityRequest
///
/// Client-side events recorded by the frontend (`POST /api/logging/activity`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, max = 64, message = "action must be 1-64 characters"))]
    pub action: String,
    #[validate(length(min = 1, max = 64, message = "entity_type must be 1-64 characters"))]
    pub entity_type: String,
    pub entity_id: Option<i64>,
    #[validate(length(max = 2000, message = "details must be at most 2000 characters"))]
    pub details: Option<String>,
}

/// ActivityFilter
///
/// Query parameters for `GET /api/logging/activity`.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
pub struct ActivityFilter {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    /// Defaults to 100, capped at 500.
    pub limit: Option<i64>,
}

impl ActivityFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}
