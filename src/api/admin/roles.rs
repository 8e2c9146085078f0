//! Role management admin endpoints

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::Role;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
}

/// GET /admin/roles
pub async fn list_roles(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Role>>, ApiError> {
    let roles = state.auth_service.list_roles().await?;
    Ok(Json(roles))
}

/// POST /admin/roles
pub async fn create_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.auth_service.create_role(&request.name).await?;

    info!(admin_id = admin.user_id, role_id = role.id, role = %role.name, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}
