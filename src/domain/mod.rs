//! Domain layer - Core business types and contracts

pub mod auth;
pub mod error;
pub mod role;
pub mod transaction;
pub mod user;

pub use auth::{AuthMeta, AuthResponse, TokenClaims, TokenError, TokenProvider, TOKEN_TYPE_BEARER};
pub use error::{DomainError, ErrorKind, StageExt, StoreError};
pub use role::{Role, RoleRef, RoleStore, DEFAULT_ROLE};
pub use transaction::{Conn, TransactionError, TransactionManager, TxState, UnitOfWork};
pub use user::{LoginRequest, NewUser, RegisterRequest, User, UserProfile, UserStore, UserUpdate};
