//! Authentication API endpoints
//!
//! Registration and login issue bearer tokens; the `/me` routes act on the
//! identity carried by the presented token.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::{AuthResponse, LoginRequest, RegisterRequest, UserProfile, UserUpdate};

/// Create the authentication router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me).delete(delete_me))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let response = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.auth_service.login(request).await?;
    Ok(Json(response))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireUser(meta): RequireUser,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.auth_service.me(meta.user_id).await?;
    Ok(Json(profile))
}

/// PUT /auth/me
pub async fn update_me(
    State(state): State<AppState>,
    RequireUser(meta): RequireUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    state.auth_service.update(meta.user_id, update).await?;
    let profile = state.auth_service.me(meta.user_id).await?;
    Ok(Json(profile))
}

/// DELETE /auth/me
///
/// Soft-deletes the account; tokens already issued stay valid until they expire.
pub async fn delete_me(
    State(state): State<AppState>,
    RequireUser(meta): RequireUser,
) -> Result<StatusCode, ApiError> {
    state.auth_service.delete(meta.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
