/// Router Module Index
///
/// One router per resource group, each nested under its `/api/...` prefix by
/// `create_router`. Everything except `public` sits behind the authentication layer;
/// the permission check itself happens inside each handler.

/// Health check and the token-issuing endpoints (login, refresh).
pub mod public;

/// Caller-scoped session endpoints (`/api/auth/logout`, `/api/auth/me`).
pub mod session;

/// Users and employees, including the employee CSV template and bulk upload.
pub mod user_management;

/// Roles and the permission catalogue.
pub mod role_management;

/// Questions, review workflow, comments and the question CSV import.
pub mod question_bank;

pub mod feature_requests;

pub mod logging;
