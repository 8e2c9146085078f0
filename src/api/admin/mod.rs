//! Admin API endpoints for managing users and roles

pub mod roles;
pub mod users;

use axum::{
    routing::{get, put},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/users", get(users::list_users))
        .route(
            "/users/{user_id}/roles/{role_id}",
            put(users::set_role).delete(users::remove_role),
        )
}
