//! Authentication domain
//!
//! Identity snapshots, token claims and the token provider contract.

mod meta;
mod token;

pub use meta::{AuthMeta, AuthResponse, TOKEN_TYPE_BEARER};
pub use token::{TokenClaims, TokenError, TokenProvider};
