//! Bearer token extractors

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::AuthMeta;

/// Extractor that requires a valid bearer token
///
/// Yields the identity snapshot carried by the token; the stores are not consulted.
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthMeta);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let meta = state.access.require_auth(authorization(&parts.headers)?)?;
        Ok(RequireUser(meta))
    }
}

/// Extractor that additionally requires the configured administrator role
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthMeta);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(meta) = RequireUser::from_request_parts(parts, state).await?;
        state.access.require_role(&meta, &state.admin_role)?;

        debug!(user_id = meta.user_id, "Admin access granted");
        Ok(RequireAdmin(meta))
    }
}

/// Raw `Authorization` header value, if present
fn authorization(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))
        })
        .transpose()
}
