use crate::{AppState, handlers::roles};
use axum::{
    Router,
    routing::{get, put},
};

/// Role Management Router
///
/// Mounted at `/api/role_management`. Deleting a role that users still hold is a 409.
pub fn role_management_routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route("/roles/{id}/permissions", put(roles::set_role_permissions))
        // Read-only permission catalogue, seeded by migration.
        .route("/permissions", get(roles::list_permissions))
}
