//! AES-GCM wrapping of signed tokens

use aes_gcm::{
    aead::{consts::U12, Aead, KeyInit},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use std::fmt::{self, Debug};

use crate::domain::TokenError;

/// 96-bit nonce, the recommended size for GCM
pub const NONCE_SIZE: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

enum CipherKind {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// Authenticated symmetric encryption of compact tokens.
///
/// Output format: `base64(nonce || ciphertext || tag)`.
pub struct TokenCipher {
    kind: CipherKind,
}

impl Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher")
            .field("algorithm", &self.algorithm())
            .field("key", &"[hidden]")
            .finish()
    }
}

impl TokenCipher {
    /// Build a cipher from raw key bytes; 16, 24 or 32 bytes select AES-128/192/256
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        let invalid = |_| TokenError::configuration("invalid encryption key");

        let kind = match key.len() {
            16 => CipherKind::Aes128(Aes128Gcm::new_from_slice(key).map_err(invalid)?),
            24 => CipherKind::Aes192(Aes192Gcm::new_from_slice(key).map_err(invalid)?),
            32 => CipherKind::Aes256(Aes256Gcm::new_from_slice(key).map_err(invalid)?),
            other => {
                return Err(TokenError::configuration(format!(
                    "encryption key must be 16, 24 or 32 bytes, got {}",
                    other
                )))
            }
        };

        Ok(Self { kind })
    }

    pub fn algorithm(&self) -> &'static str {
        match self.kind {
            CipherKind::Aes128(_) => "AES-128-GCM",
            CipherKind::Aes192(_) => "AES-192-GCM",
            CipherKind::Aes256(_) => "AES-256-GCM",
        }
    }

    /// Encrypt under a fresh random nonce and encode as base64
    pub fn seal(&self, plaintext: &str) -> Result<String, TokenError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| TokenError::encryption(format!("generate nonce: {}", e)))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match &self.kind {
            CipherKind::Aes128(c) => c.encrypt(nonce, plaintext.as_bytes()),
            CipherKind::Aes192(c) => c.encrypt(nonce, plaintext.as_bytes()),
            CipherKind::Aes256(c) => c.encrypt(nonce, plaintext.as_bytes()),
        }
        .map_err(|_| TokenError::encryption("seal token"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed))
    }

    /// Decode and decrypt a value produced by [`TokenCipher::seal`]
    pub fn open(&self, sealed: &str) -> Result<String, TokenError> {
        let raw = BASE64
            .decode(sealed)
            .map_err(|e| TokenError::decryption(format!("decode ciphertext: {}", e)))?;

        if raw.len() < NONCE_SIZE {
            return Err(TokenError::decryption("ciphertext too short"));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = match &self.kind {
            CipherKind::Aes128(c) => c.decrypt(nonce, ciphertext),
            CipherKind::Aes192(c) => c.decrypt(nonce, ciphertext),
            CipherKind::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| TokenError::decryption("authentication tag mismatch"))?;

        String::from_utf8(plaintext)
            .map_err(|_| TokenError::decryption("plaintext is not valid UTF-8"))
    }
}
