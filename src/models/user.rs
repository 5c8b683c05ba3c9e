use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use super::role::Role;

/// User
///
/// A login identity from the `users` table. The password hash is never loaded into
/// this struct; see [`UserCredentials`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    // Soft-delete flag. Inactive users cannot log in and their tokens stop resolving.
    pub is_active: bool,
    #[ts(type = "string | null")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal row used only by the login flow.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub password_hash: String,
    pub is_active: bool,
}

/// UserWithRoles
///
/// Detail view of a user, including every role linked to them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserWithRoles {
    pub user: User,
    pub roles: Vec<Role>,
}

/// Profile
///
/// The caller's own identity as resolved by the auth layer: active role names and the
/// union of their permission strings.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// CreateUserRequest
///
/// Payload for `POST /api/user_management/users`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "full_name is required"))]
    pub full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub role_ids: Vec<i64>,
}

/// UpdateUserRequest
///
/// Partial update payload for `PUT /api/user_management/users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "full_name must not be empty"))]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// AssignRolesRequest
///
/// Replaces the full set of active roles for a user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<i64>,
}

/// LoginRequest
///
/// `username` accepts either the username or the email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// TokenResponse
///
/// Returned by login and refresh. `expires_in` is the access token lifetime in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: Profile,
}

/// RefreshTokenRecord
///
/// Internal row from `refresh_tokens`. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}
