//! User administration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::UserProfile;

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = state.auth_service.list_users().await?;
    Ok(Json(users))
}

/// PUT /admin/users/{user_id}/roles/{role_id}
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.auth_service.set_role(user_id, role_id).await?;

    info!(admin_id = admin.user_id, user_id, role_id, "Role granted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /admin/users/{user_id}/roles/{role_id}
pub async fn remove_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.auth_service.remove_role(user_id, role_id).await?;

    info!(admin_id = admin.user_id, user_id, role_id, "Role revoked");
    Ok(StatusCode::NO_CONTENT)
}
