//! Authentication infrastructure module
//!
//! Token signing and sealing, password hashing, the account controller and
//! the access checks applied to incoming requests.

mod cipher;
mod controller;
mod jwt;
mod middleware;
mod password;

pub use cipher::TokenCipher;
pub use controller::AuthController;
pub use jwt::{JwtConfig, JwtService};
pub use middleware::{AccessError, AccessMiddleware};
pub use password::{verify_dummy, Argon2Hasher, PasswordHasher};
