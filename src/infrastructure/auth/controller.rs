//! Account orchestration: registration, login and user/role management

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::password::{verify_dummy, Argon2Hasher, PasswordHasher};
use crate::domain::{
    AuthMeta, AuthResponse, Conn, DomainError, LoginRequest, NewUser, RegisterRequest, Role,
    RoleStore, StageExt, StoreError, TokenProvider, TransactionError, UnitOfWork, UserProfile,
    UserStore, UserUpdate, DEFAULT_ROLE,
};

/// Coordinates password hashing, store writes and token issuance.
///
/// Registration runs inside a single unit of work shared by the user and
/// role stores, so both stores must use the same transaction type.
pub struct AuthController<U, R, H = Argon2Hasher> {
    users: U,
    roles: R,
    hasher: Arc<H>,
    tokens: Arc<dyn TokenProvider>,
    timeout: Option<Duration>,
}

impl<U: Debug, R: Debug, H> Debug for AuthController<U, R, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthController")
            .field("users", &self.users)
            .field("roles", &self.roles)
            .field("tokens", &self.tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<U, R, H> AuthController<U, R, H>
where
    U: UserStore,
    R: RoleStore<Tx = U::Tx>,
    H: PasswordHasher + 'static,
{
    pub fn new(users: U, roles: R, hasher: H, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            users,
            roles,
            hasher: Arc::new(hasher),
            tokens,
            timeout: None,
        }
    }

    /// Bound register and login by a deadline; on expiry the operation is abandoned
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn with_deadline<T>(
        &self,
        operation: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        let Some(limit) = self.timeout else {
            return operation.await;
        };

        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = limit.as_millis() as u64, "Operation deadline exceeded");
                Err(TransactionError::DeadlineExceeded { timeout: limit }.into())
            }
        }
    }

    /// Run password work on the blocking pool so a deadline can abandon it
    async fn with_hasher<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&H) -> T + Send + 'static,
    {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || work(&*hasher))
            .await
            .map_err(|e| DomainError::internal(format!("password task failed: {}", e)))
    }

    /// Create an account with the default role and issue its first token
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, DomainError> {
        self.with_deadline(self.register_account(request)).await
    }

    async fn register_account(&self, request: RegisterRequest) -> Result<AuthResponse, DomainError> {
        request
            .validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let password = request.password.clone();
        let password_hash = self
            .with_hasher(move |hasher| hasher.hash(&password))
            .await
            .and_then(|hashed| hashed)
            .stage("hash password")?;
        let new_user = request.into_new_user(password_hash);

        let mut uow = self.users.start_tx().await.stage("start transaction")?;

        let (user_id, role) = match self.create_with_default_role(&mut uow, &new_user).await {
            Ok(created) => created,
            Err(e) => return Err(self.abort(&mut uow, e).await),
        };

        if let Err(e) = self.users.commit_tx(&mut uow).await {
            let cause = DomainError::from(e).at("commit transaction");
            return Err(self.abort(&mut uow, cause).await);
        }

        let meta = AuthMeta::new(user_id, vec![role.to_ref()]);
        let token = self.tokens.create_token(&meta).stage("create token")?;

        info!(user_id, "User registered");

        Ok(AuthResponse::bearer(token, meta))
    }

    async fn create_with_default_role(
        &self,
        uow: &mut UnitOfWork<U::Tx>,
        user: &NewUser,
    ) -> Result<(i64, Role), DomainError> {
        let user_id = self
            .users
            .insert_one(Conn::Tx(&mut *uow), user)
            .await
            .stage("insert user")?;

        let role = self
            .roles
            .find_one_by_name(Conn::Tx(&mut *uow), DEFAULT_ROLE)
            .await
            .stage("find default role")?
            .ok_or_else(|| {
                DomainError::configuration(format!("role '{}' is not provisioned", DEFAULT_ROLE))
            })
            .stage("find default role")?;

        self.users
            .set_role(Conn::Tx(&mut *uow), user_id, role.id)
            .await
            .stage("set default role")?;

        Ok((user_id, role))
    }

    /// Roll back after a failure, reporting both errors if the rollback fails too
    async fn abort(&self, uow: &mut UnitOfWork<U::Tx>, cause: DomainError) -> DomainError {
        match self.users.rollback_tx(uow).await {
            Ok(()) => {
                debug!(unit_of_work = %uow.id(), error = %cause, "Transaction rolled back");
                cause
            }
            Err(rollback) => {
                error!(unit_of_work = %uow.id(), error = %cause, rollback_error = %rollback, "Rollback failed");
                DomainError::RollbackFailed {
                    source: Box::new(cause),
                    rollback,
                }
            }
        }
    }

    /// Check credentials and issue a token carrying the user's current roles
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, DomainError> {
        self.with_deadline(self.authenticate(request)).await
    }

    async fn authenticate(&self, request: LoginRequest) -> Result<AuthResponse, DomainError> {
        let user = self
            .users
            .find_one_by_email(Conn::Pool, &request.email)
            .await
            .stage("find user")?;

        let Some(user) = user.filter(|u| !u.is_deleted) else {
            let password = request.password;
            self.with_hasher(move |hasher| verify_dummy(hasher, &password))
                .await?;
            debug!("Login attempt for unknown account");
            return Err(DomainError::Authentication);
        };

        let password = request.password;
        let hash = user.password_hash.clone();
        let verified = self
            .with_hasher(move |hasher| hasher.verify(&password, &hash))
            .await?;

        if !verified {
            debug!(user_id = user.id, "Login attempt with wrong password");
            return Err(DomainError::Authentication);
        }

        let roles = self
            .roles
            .list_user_roles(Conn::Pool, user.id)
            .await
            .stage("list user roles")?;

        let meta = AuthMeta::new(user.id, roles.iter().map(Role::to_ref).collect());
        let token = self.tokens.create_token(&meta).stage("create token")?;

        info!(user_id = user.id, "User logged in");

        Ok(AuthResponse::bearer(token, meta))
    }

    /// Profile of a live user
    pub async fn me(&self, user_id: i64) -> Result<UserProfile, DomainError> {
        self.users
            .find_one_by_id(Conn::Pool, user_id)
            .await
            .stage("find user")?
            .filter(|u| !u.is_deleted)
            .map(|u| u.to_profile())
            .ok_or_else(|| StoreError::not_found(format!("user {}", user_id)))
            .stage("find user")
    }

    pub async fn update(&self, user_id: i64, update: UserUpdate) -> Result<(), DomainError> {
        update
            .validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        self.users
            .update_one(Conn::Pool, user_id, &update)
            .await
            .stage("update user")
    }

    /// Soft-delete an account; its tokens stay valid until they expire
    pub async fn delete(&self, user_id: i64) -> Result<(), DomainError> {
        self.users
            .delete_one(Conn::Pool, user_id)
            .await
            .stage("delete user")?;

        info!(user_id, "User deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, DomainError> {
        let users = self.users.list_all(Conn::Pool).await.stage("list users")?;
        Ok(users.iter().map(|u| u.to_profile()).collect())
    }

    pub async fn set_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError> {
        self.users
            .set_role(Conn::Pool, user_id, role_id)
            .await
            .stage("set role")?;

        info!(user_id, role_id, "Role assigned");
        Ok(())
    }

    pub async fn remove_role(&self, user_id: i64, role_id: i64) -> Result<(), DomainError> {
        self.users
            .remove_role(Conn::Pool, user_id, role_id)
            .await
            .stage("remove role")?;

        info!(user_id, role_id, "Role removed");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, DomainError> {
        self.roles.list_all(Conn::Pool).await.stage("list roles")
    }

    pub async fn create_role(&self, name: &str) -> Result<Role, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Role name cannot be empty"));
        }

        let id = self
            .roles
            .insert_one(Conn::Pool, name)
            .await
            .stage("insert role")?;

        self.roles
            .find_one_by_id(Conn::Pool, id)
            .await
            .stage("find role")?
            .ok_or_else(|| StoreError::not_found(format!("role {}", id)))
            .stage("find role")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, TokenError};
    use crate::infrastructure::auth::password::MockPasswordHasher;
    use crate::infrastructure::auth::{JwtConfig, JwtService};
    use crate::infrastructure::role::InMemoryRoleStore;
    use crate::infrastructure::storage::{FailPoint, Fault, MemoryDb};
    use crate::infrastructure::user::InMemoryUserStore;

    /// Cheap reversible hasher so tests do not pay for Argon2
    #[derive(Debug, Clone, Default)]
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, DomainError> {
            Ok(format!("plain${}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash.strip_prefix("plain$") == Some(password)
        }
    }

    type TestController<H = PlainHasher> = AuthController<InMemoryUserStore, InMemoryRoleStore, H>;

    fn tokens() -> Arc<dyn TokenProvider> {
        Arc::new(JwtService::new(JwtConfig::new("controller-test-secret", 1)).unwrap())
    }

    fn setup_with<H: PasswordHasher + 'static>(roles: &[&str], hasher: H) -> (TestController<H>, MemoryDb) {
        let db = MemoryDb::with_roles(roles);
        let controller = AuthController::new(
            InMemoryUserStore::new(db.clone()),
            InMemoryRoleStore::new(db.clone()),
            hasher,
            tokens(),
        );
        (controller, db)
    }

    fn setup() -> (TestController, MemoryDb) {
        setup_with(&["default", "admin"], PlainHasher)
    }

    fn register_request(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "correct horse".to_string(),
            username: username.to_string(),
            first_name: "Ada".to_string(),
            middle_name: String::new(),
            last_name: "Lovelace".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn assert_no_rows(db: &MemoryDb) {
        let tables = db.snapshot().await;
        assert!(tables.users.is_empty(), "users left behind: {:?}", tables.users);
        assert!(tables.user_roles.is_empty());
    }

    #[tokio::test]
    async fn test_register_assigns_default_role_and_issues_token() {
        let (controller, db) = setup();

        let response = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.meta.roles.len(), 1);
        assert_eq!(response.meta.roles[0].name, DEFAULT_ROLE);
        assert_eq!(response.meta.roles[0].id, 1);

        let claims = controller.tokens.validate_token(&response.token).unwrap();
        assert_eq!(AuthMeta::try_from(claims).unwrap(), response.meta);

        let tables = db.snapshot().await;
        assert_eq!(tables.users.len(), 1);
        assert!(tables.user_roles.contains(&(response.meta.user_id, 1)));
        assert!(tables.users[&response.meta.user_id].password_hash.starts_with("plain$"));
    }

    #[tokio::test]
    async fn test_register_role_id_is_not_user_id() {
        let (controller, _db) = setup();

        controller.register(register_request("a@example.com", "first")).await.unwrap();
        let second = controller
            .register(register_request("b@example.com", "second"))
            .await
            .unwrap();

        assert_eq!(second.meta.user_id, 2);
        assert_eq!(second.meta.roles[0].id, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_request() {
        let (controller, db) = setup();
        let mut request = register_request("not-an-email", "ada");
        request.password = "short".to_string();

        let err = controller.register(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_failure_in_set_role_rolls_back_everything() {
        let (controller, db) = setup();
        db.inject(FailPoint::SetRole, Fault::Error).await;

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(err.to_string().starts_with("set default role:"));
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_without_default_role_is_internal_error() {
        let (controller, db) = setup_with(&["admin"], PlainHasher);

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(err.root(), DomainError::Configuration { .. }));
        assert!(err.to_string().starts_with("find default role:"));
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_rollback_failure_is_reported_with_cause() {
        let (controller, db) = setup();
        db.inject(FailPoint::SetRole, Fault::Error).await;
        db.inject(FailPoint::RollbackTx, Fault::Error).await;

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        match &err {
            DomainError::RollbackFailed { source, rollback } => {
                assert_eq!(source.kind(), ErrorKind::Store);
                assert!(matches!(rollback, TransactionError::Rollback { .. }));
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_commit_failure() {
        let (controller, db) = setup();
        db.inject(FailPoint::CommitTx, Fault::Error).await;

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert!(err.to_string().starts_with("commit transaction:"));
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_start_failure() {
        let (controller, db) = setup();
        db.inject(FailPoint::StartTx, Fault::Error).await;

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let (controller, db) = setup();
        controller.register(register_request("ada@example.com", "ada")).await.unwrap();

        let err = controller
            .register(register_request("ada@example.com", "ada2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            DomainError::Store(StoreError::Conflict { .. })
        ));
        assert_eq!(db.snapshot().await.users.len(), 1);
        assert_eq!(db.snapshot().await.user_roles.len(), 1);
    }

    #[tokio::test]
    async fn test_register_deadline_discards_writes() {
        let (controller, db) = setup();
        let controller = controller.with_timeout(Duration::from_millis(50));
        db.inject(FailPoint::SetRole, Fault::Delay(Duration::from_secs(5))).await;

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Transaction(TransactionError::DeadlineExceeded { .. })
        ));
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_register_deadline_covers_password_hashing() {
        struct SlowHasher;

        impl PasswordHasher for SlowHasher {
            fn hash(&self, password: &str) -> Result<String, DomainError> {
                std::thread::sleep(Duration::from_millis(400));
                Ok(format!("plain${}", password))
            }

            fn verify(&self, _password: &str, _hash: &str) -> bool {
                false
            }
        }

        let (controller, db) = setup_with(&["default"], SlowHasher);
        let controller = controller.with_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(matches!(
            err,
            DomainError::Transaction(TransactionError::DeadlineExceeded { .. })
        ));
        assert_no_rows(&db).await;
    }

    #[tokio::test]
    async fn test_login_issues_token_with_live_roles() {
        let (controller, _db) = setup();
        let registered = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap();
        controller.set_role(registered.meta.user_id, 2).await.unwrap();

        let response = controller
            .login(login_request("ada@example.com", "correct horse"))
            .await
            .unwrap();

        assert_eq!(response.meta.user_id, registered.meta.user_id);
        assert!(response.meta.has_role("default"));
        assert!(response.meta.has_role("admin"));
        assert!(!registered.meta.has_role("admin"));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (controller, _db) = setup();
        controller.register(register_request("ada@example.com", "ada")).await.unwrap();

        let wrong_password = controller
            .login(login_request("ada@example.com", "wrong password"))
            .await
            .unwrap_err();
        let unknown_email = controller
            .login(login_request("nobody@example.com", "correct horse"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, DomainError::Authentication));
        assert!(matches!(unknown_email, DomainError::Authentication));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_login_unknown_account_still_verifies_once() {
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().times(1).returning(|_, _| false);
        let (controller, _db) = setup_with(&["default"], hasher);

        let err = controller
            .login(login_request("nobody@example.com", "whatever"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Authentication));
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_log_in() {
        let (controller, _db) = setup();
        let registered = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap();

        controller.delete(registered.meta.user_id).await.unwrap();

        let err = controller
            .login(login_request("ada@example.com", "correct horse"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Authentication));

        let err = controller.me(registered.meta.user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_me_and_update() {
        let (controller, _db) = setup();
        let id = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap()
            .meta
            .user_id;

        controller
            .update(
                id,
                UserUpdate {
                    email: "augusta@example.com".to_string(),
                    username: "augusta".to_string(),
                    first_name: "Augusta".to_string(),
                    middle_name: "Ada".to_string(),
                    last_name: "King".to_string(),
                },
            )
            .await
            .unwrap();

        let profile = controller.me(id).await.unwrap();
        assert_eq!(profile.email, "augusta@example.com");
        assert_eq!(profile.middle_name, "Ada");
        assert_eq!(controller.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_rows_surface_as_not_found() {
        let (controller, _db) = setup();
        let update = UserUpdate {
            email: "x@example.com".to_string(),
            username: "xavier".to_string(),
            first_name: String::new(),
            middle_name: String::new(),
            last_name: String::new(),
        };

        for err in [
            controller.update(404, update).await.unwrap_err(),
            controller.delete(404).await.unwrap_err(),
            controller.remove_role(404, 1).await.unwrap_err(),
        ] {
            assert!(
                matches!(err.root(), DomainError::Store(StoreError::NotFound { .. })),
                "unexpected error {:?}",
                err
            );
        }
    }

    #[tokio::test]
    async fn test_role_management() {
        let (controller, _db) = setup();

        let auditor = controller.create_role("auditor").await.unwrap();
        assert_eq!(auditor.name, "auditor");
        assert_eq!(controller.list_roles().await.unwrap().len(), 3);

        let err = controller.create_role("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let id = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap()
            .meta
            .user_id;
        controller.set_role(id, auditor.id).await.unwrap();
        controller.remove_role(id, auditor.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_token_failure_after_commit_keeps_account() {
        #[derive(Debug)]
        struct BrokenTokens;

        impl TokenProvider for BrokenTokens {
            fn create_token(&self, _meta: &AuthMeta) -> Result<String, TokenError> {
                Err(TokenError::signing("key unavailable"))
            }

            fn validate_token(&self, _token: &str) -> Result<crate::domain::TokenClaims, TokenError> {
                Err(TokenError::InvalidSignature)
            }

            fn expiration_hours(&self) -> u32 {
                1
            }
        }

        let db = MemoryDb::with_roles(&["default"]);
        let controller = AuthController::new(
            InMemoryUserStore::new(db.clone()),
            InMemoryRoleStore::new(db.clone()),
            PlainHasher,
            Arc::new(BrokenTokens),
        );

        let err = controller
            .register(register_request("ada@example.com", "ada"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(db.snapshot().await.users.len(), 1);
    }
}
