//! Token claims and the token provider contract

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

use super::meta::AuthMeta;
use crate::domain::role::RoleRef;

/// Token issuance and validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token configuration: {message}")]
    Configuration { message: String },

    #[error("Failed to sign token: {message}")]
    Signing { message: String },

    #[error("Failed to encrypt token: {message}")]
    Encryption { message: String },

    #[error("Failed to decrypt token: {message}")]
    Decryption { message: String },

    #[error("Unexpected signing algorithm")]
    UnsupportedAlgorithm,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Malformed token: {message}")]
    Malformed { message: String },

    #[error("Token subject '{subject}' is not a user id")]
    InvalidSubject { subject: String },
}

impl TokenError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption {
            message: message.into(),
        }
    }

    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// True when the token itself was rejected, as opposed to a local failure while issuing
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Configuration { .. } | Self::Signing { .. } | Self::Encryption { .. }
        )
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
    /// Subject (user id as a decimal string)
    pub sub: String,
    /// Roles held by the subject at issuance
    pub roles: Vec<RoleRef>,
}

impl TokenClaims {
    /// Create claims for a subject that expire `lifetime_hours` from now
    pub fn new(meta: &AuthMeta, lifetime_hours: u32) -> Self {
        let exp = Utc::now() + Duration::hours(i64::from(lifetime_hours));

        Self {
            exp: exp.timestamp(),
            sub: meta.user_id.to_string(),
            roles: meta.roles.clone(),
        }
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Issues and validates bearer tokens
pub trait TokenProvider: Send + Sync + Debug {
    /// Sign (and, when configured, encrypt) a token for the given identity
    fn create_token(&self, meta: &AuthMeta) -> Result<String, TokenError>;

    /// Decrypt (when configured), verify and decode a token
    fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError>;

    /// Token lifetime in hours
    fn expiration_hours(&self) -> u32;
}
