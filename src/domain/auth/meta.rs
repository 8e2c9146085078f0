//! Identity snapshot carried by tokens

use serde::{Deserialize, Serialize};

use super::token::{TokenClaims, TokenError};
use crate::domain::role::RoleRef;

/// Token type reported alongside issued tokens
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Subject id plus the roles it held when the token was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMeta {
    #[serde(rename = "sub")]
    pub user_id: i64,
    pub roles: Vec<RoleRef>,
}

impl AuthMeta {
    pub fn new(user_id: i64, roles: Vec<RoleRef>) -> Self {
        Self { user_id, roles }
    }

    /// Exact, case-sensitive role name lookup
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }
}

impl TryFrom<TokenClaims> for AuthMeta {
    type Error = TokenError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::InvalidSubject {
                subject: claims.sub.clone(),
            })?;

        Ok(Self {
            user_id,
            roles: claims.roles,
        })
    }
}

/// Result of a successful register or login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub meta: AuthMeta,
}

impl AuthResponse {
    pub fn bearer(token: String, meta: AuthMeta) -> Self {
        Self {
            token,
            token_type: TOKEN_TYPE_BEARER,
            meta,
        }
    }
}
