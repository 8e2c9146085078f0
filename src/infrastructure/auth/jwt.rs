//! HMAC-signed JWT issuance and validation with optional AES-GCM sealing

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::Deserialize;
use std::fmt::{self, Debug};
use tracing::debug;

use super::cipher::TokenCipher;
use crate::domain::{AuthMeta, TokenClaims, TokenError, TokenProvider};

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

fn default_expire_hours() -> u32 {
    24
}

/// Configuration for JWT service
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: String,
    /// Token lifetime in hours
    #[serde(default = "default_expire_hours", alias = "expiration_hours")]
    pub expire_hours: u32,
    /// Raw AES key (16, 24 or 32 bytes); empty or absent disables encryption
    #[serde(default)]
    pub encryption: Option<String>,
}

impl JwtConfig {
    /// Create new JWT configuration without encryption
    pub fn new(secret: impl Into<String>, expire_hours: u32) -> Self {
        Self {
            secret: secret.into(),
            expire_hours,
            encryption: None,
        }
    }

    pub fn with_encryption(mut self, key: impl Into<String>) -> Self {
        self.encryption = Some(key.into());
        self
    }

    fn encryption_key(&self) -> Option<&str> {
        self.encryption.as_deref().filter(|key| !key.is_empty())
    }
}

impl Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[hidden]")
            .field("expire_hours", &self.expire_hours)
            .field("encryption", &self.encryption_key().map(|_| "[hidden]"))
            .finish()
    }
}

/// What happens to a signed token before it leaves the service
#[derive(Debug)]
enum TokenSealing {
    SignOnly,
    Encrypted(TokenCipher),
}

impl TokenSealing {
    fn seal(&self, signed: String) -> Result<String, TokenError> {
        match self {
            Self::SignOnly => Ok(signed),
            Self::Encrypted(cipher) => cipher.seal(&signed),
        }
    }

    fn unseal(&self, token: &str) -> Result<String, TokenError> {
        match self {
            Self::SignOnly => Ok(token.to_string()),
            Self::Encrypted(cipher) => cipher.open(token),
        }
    }
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<String>,
}

/// Reject anything but the HMAC family before signature checks run.
///
/// `jsonwebtoken` reports unknown markers such as `none` as a JSON error,
/// which would hide the real reason a token was refused.
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let (segment, _) = token
        .split_once('.')
        .ok_or_else(|| TokenError::malformed("token is not a compact JWS"))?;

    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::malformed(format!("header encoding: {}", e)))?;
    let header: RawHeader = serde_json::from_slice(&raw)
        .map_err(|e| TokenError::malformed(format!("header json: {}", e)))?;

    match header.alg.as_deref() {
        Some("HS256" | "HS384" | "HS512") => Ok(()),
        _ => Err(TokenError::UnsupportedAlgorithm),
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
        JwtErrorKind::ExpiredSignature => TokenError::Expired,
        JwtErrorKind::InvalidAlgorithm | JwtErrorKind::InvalidAlgorithmName => {
            TokenError::UnsupportedAlgorithm
        }
        _ => TokenError::malformed(err.to_string()),
    }
}

/// JWT service implementation using a shared HMAC secret
pub struct JwtService {
    expire_hours: u32,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    sealing: TokenSealing,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("expire_hours", &self.expire_hours)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .field("sealing", &self.sealing)
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service; fails on an empty secret or an unusable encryption key
    pub fn new(config: JwtConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::configuration("signing secret must not be empty"));
        }

        let sealing = match config.encryption_key() {
            Some(key) => TokenSealing::Encrypted(TokenCipher::new(key.as_bytes())?),
            None => TokenSealing::SignOnly,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            expire_hours: config.expire_hours,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            sealing,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.sealing, TokenSealing::Encrypted(_))
    }
}

impl TokenProvider for JwtService {
    fn create_token(&self, meta: &AuthMeta) -> Result<String, TokenError> {
        let claims = TokenClaims::new(meta, self.expire_hours);

        let signed = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::signing(e.to_string()))?;

        self.sealing.seal(signed)
    }

    fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let compact = self.sealing.unseal(token)?;
        check_algorithm(&compact)?;

        let data = decode::<TokenClaims>(&compact, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;

        if data.claims.is_expired() {
            debug!(sub = %data.claims.sub, "Token reached its expiry");
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    fn expiration_hours(&self) -> u32 {
        self.expire_hours
    }
}
