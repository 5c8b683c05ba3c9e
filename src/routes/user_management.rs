use crate::{
    AppState,
    handlers::{employees, users},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// User Management Router
///
/// Mounted at `/api/user_management`. Users are soft-deleted; so are employees.
pub fn user_management_routes() -> Router<AppState> {
    Router::new()
        // --- Users (users:read / users:write / users:delete) ---
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // PUT /users/{id}/roles
        // Replaces the user's active role set.
        .route("/users/{id}/roles", put(users::assign_roles))
        // --- Employees (employees:read / employees:write / employees:delete) ---
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        // GET /employees/template
        // Header-only CSV to fill in for the bulk upload.
        .route("/employees/template", get(employees::employee_template))
        // POST /employees/bulk_upload
        // multipart/form-data with a `file` field; returns a per-line summary.
        .route(
            "/employees/bulk_upload",
            post(employees::bulk_upload_employees),
        )
        .route(
            "/employees/{id}",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
}
