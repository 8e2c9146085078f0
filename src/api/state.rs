//! Application state for shared services

use std::sync::Arc;

use crate::domain::{
    AuthResponse, DomainError, LoginRequest, RegisterRequest, Role, RoleStore, UserProfile,
    UserStore, UserUpdate,
};
use crate::infrastructure::auth::{AccessMiddleware, AuthController, PasswordHasher};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthServiceTrait>,
    pub access: AccessMiddleware,
    /// Role required by the administration routes
    pub admin_role: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("access", &self.access)
            .field("admin_role", &self.admin_role)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        auth_service: Arc<dyn AuthServiceTrait>,
        access: AccessMiddleware,
        admin_role: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            auth_service,
            access,
            admin_role: admin_role.into(),
        }
    }
}

/// Trait for account and role operations
#[async_trait::async_trait]
pub trait AuthServiceTrait: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, DomainError>;
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, DomainError>;
    async fn me(&self, user_id: i64) -> Result<UserProfile, DomainError>;
    async fn update(&self, user_id: i64, update: UserUpdate) -> Result<(), DomainError>;
    async fn delete(&self, user_id: i64) -> Result<(), DomainError>;
    async fn list_users(&self) -> Result<Vec<UserProfile>, DomainError>;
    async fn set_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError>;
    async fn remove_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError>;
    async fn list_roles(&self) -> Result<Vec<Role>, DomainError>;
    async fn create_role(&self, name: &str) -> Result<Role, DomainError>;
}

#[async_trait::async_trait]
impl<U, R, H> AuthServiceTrait for AuthController<U, R, H>
where
    U: UserStore + 'static,
    R: RoleStore<Tx = U::Tx> + 'static,
    H: PasswordHasher + 'static,
{
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, DomainError> {
        AuthController::register(self, request).await
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, DomainError> {
        AuthController::login(self, request).await
    }

    async fn me(&self, user_id: i64) -> Result<UserProfile, DomainError> {
        AuthController::me(self, user_id).await
    }

    async fn update(&self, user_id: i64, update: UserUpdate) -> Result<(), DomainError> {
        AuthController::update(self, user_id, update).await
    }

    async fn delete(&self, user_id: i64) -> Result<(), DomainError> {
        AuthController::delete(self, user_id).await
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, DomainError> {
        AuthController::list_users(self).await
    }

    async fn set_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError> {
        AuthController::set_role(self, user_id, role_id).await
    }

    async fn remove_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError> {
        AuthController::remove_role(self, user_id, role_id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, DomainError> {
        AuthController::list_roles(self).await
    }

    async fn create_role(&self, name: &str) -> Result<Role, DomainError> {
        AuthController::create_role(self, name).await
    }
}
