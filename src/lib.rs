//! Authgate
//!
//! Account registration and login that issue HS256 bearer tokens, optionally
//! sealed with AES-GCM, plus role-based access checks over those tokens.
//! Users and roles live in PostgreSQL or in an in-memory database.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::{AppState, AuthServiceTrait};
use crate::config::StorageBackend;
use domain::{TokenProvider, DEFAULT_ROLE};
use infrastructure::{
    auth::{AccessMiddleware, Argon2Hasher, AuthController, JwtService},
    role::{InMemoryRoleStore, PostgresRoleStore},
    storage::{MemoryDb, PostgresDb},
    user::{InMemoryUserStore, PostgresUserStore},
};
use tracing::{info, warn};

/// Create the application state for the configured storage backend
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let jwt = JwtService::new(config.auth.jwt.clone())
        .map_err(|e| anyhow::anyhow!("Invalid token configuration: {}", e))?;
    info!(
        expire_hours = config.auth.jwt.expire_hours,
        encrypted = jwt.is_encrypted(),
        "Token service ready"
    );
    let tokens: Arc<dyn TokenProvider> = Arc::new(jwt);

    let timeout = config.auth.operation_timeout_secs.map(Duration::from_secs);
    let admin_role = config.auth.admin_role.as_str();

    info!("Storage backend: {:?}", config.storage.backend);

    let auth_service: Arc<dyn AuthServiceTrait> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = PostgresDb::connect(&config.storage.postgres).await?;
            let controller = AuthController::new(
                PostgresUserStore::new(db.clone()),
                PostgresRoleStore::new(db),
                Argon2Hasher::new(),
                tokens.clone(),
            );
            Arc::new(apply_timeout(controller, timeout))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; accounts are lost on restart");
            let db = MemoryDb::with_roles(&seed_roles(admin_role));
            let controller = AuthController::new(
                InMemoryUserStore::new(db.clone()),
                InMemoryRoleStore::new(db),
                Argon2Hasher::new(),
                tokens.clone(),
            );
            Arc::new(apply_timeout(controller, timeout))
        }
    };

    Ok(AppState::new(
        auth_service,
        AccessMiddleware::new(tokens),
        admin_role,
    ))
}

fn apply_timeout<U, R, H>(
    controller: AuthController<U, R, H>,
    timeout: Option<Duration>,
) -> AuthController<U, R, H>
where
    U: domain::UserStore,
    R: domain::RoleStore<Tx = U::Tx>,
    H: infrastructure::auth::PasswordHasher + 'static,
{
    match timeout {
        Some(limit) => controller.with_timeout(limit),
        None => controller,
    }
}

/// Roles the in-memory database starts with
fn seed_roles(admin_role: &str) -> Vec<&str> {
    let mut roles = vec![DEFAULT_ROLE];
    if admin_role != DEFAULT_ROLE {
        roles.push(admin_role);
    }
    roles
}
