use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Permission
///
/// A capability string such as `users:write`. The catalogue is seeded by migration and
/// read-only over the API.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// RoleWithPermissions
///
/// Detail view of a role: its permissions and how many users are linked to it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
}

/// SetPermissionsRequest
///
/// Replaces the full permission set of a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct SetPermissionsRequest {
    pub permission_ids: Vec<i64>,
}
