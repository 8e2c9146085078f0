//! Health check endpoints

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Liveness: returns 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        message: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness: the role store must answer a read
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let result = state.auth_service.list_roles().await;
    let latency_ms = Some(start.elapsed().as_millis() as u64);

    let (status_code, response) = match result {
        Ok(_) => (
            StatusCode::OK,
            HealthResponse {
                status: HealthStatus::Healthy,
                version: env!("CARGO_PKG_VERSION"),
                message: None,
                latency_ms,
            },
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: HealthStatus::Unhealthy,
                version: env!("CARGO_PKG_VERSION"),
                message: Some(e.to_string()),
                latency_ms,
            },
        ),
    };

    (status_code, Json(response))
}
