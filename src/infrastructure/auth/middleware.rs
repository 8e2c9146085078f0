//! Authorization header parsing and role checks

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::domain::{AuthMeta, TokenProvider};

/// Access failures reported to callers; the underlying cause is only logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("missing or malformed authorization header")]
    MissingToken,

    #[error("invalid or expired token")]
    Unauthenticated,

    #[error("insufficient role")]
    Forbidden,
}

/// Authenticates bearer headers and enforces role membership
#[derive(Debug, Clone)]
pub struct AccessMiddleware {
    tokens: Arc<dyn TokenProvider>,
}

impl AccessMiddleware {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }

    /// Resolve the identity behind an `Authorization` header value
    pub fn require_auth(&self, header: Option<&str>) -> Result<AuthMeta, AccessError> {
        let token = credential(header.unwrap_or_default()).ok_or(AccessError::MissingToken)?;

        let claims = self.tokens.validate_token(token).map_err(|e| {
            debug!(error = %e, "Token rejected");
            AccessError::Unauthenticated
        })?;

        AuthMeta::try_from(claims).map_err(|e| {
            debug!(error = %e, "Token claims rejected");
            AccessError::Unauthenticated
        })
    }

    /// Allow only identities holding `role`; names match exactly
    pub fn require_role(&self, meta: &AuthMeta, role: &str) -> Result<(), AccessError> {
        if meta.has_role(role) {
            Ok(())
        } else {
            debug!(user_id = meta.user_id, role, "Required role missing");
            Err(AccessError::Forbidden)
        }
    }
}

/// Token part of `"<scheme> <token>"`; the scheme word is not inspected
fn credential(header: &str) -> Option<&str> {
    let mut fields = header.split(' ');
    let scheme = fields.next()?;
    let token = fields.next()?;

    if fields.next().is_some() || scheme.is_empty() || token.is_empty() {
        return None;
    }

    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoleRef;
    use crate::infrastructure::auth::{JwtConfig, JwtService};

    fn middleware() -> (AccessMiddleware, Arc<dyn TokenProvider>) {
        let tokens: Arc<dyn TokenProvider> =
            Arc::new(JwtService::new(JwtConfig::new("middleware-secret", 1)).unwrap());
        (AccessMiddleware::new(tokens.clone()), tokens)
    }

    fn admin() -> AuthMeta {
        AuthMeta::new(9, vec![RoleRef::new(1, "default"), RoleRef::new(2, "admin")])
    }

    #[test]
    fn test_credential_shapes() {
        assert_eq!(credential("Bearer abc"), Some("abc"));
        assert_eq!(credential("bearer abc"), Some("abc"));
        assert_eq!(credential("Token abc"), Some("abc"));
        assert_eq!(credential("Basic dXNlcjpwYXNz"), Some("dXNlcjpwYXNz"));
        assert_eq!(credential("Bearer"), None);
        assert_eq!(credential("Bearer "), None);
        assert_eq!(credential("Bearer a b"), None);
        assert_eq!(credential("Bearer  abc"), None);
        assert_eq!(credential(" abc"), None);
        assert_eq!(credential(""), None);
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        let (access, _) = middleware();

        for header in [None, Some(""), Some("Bearer"), Some("Bearer a b"), Some("Bearer  abc")] {
            assert_eq!(
                access.require_auth(header).unwrap_err(),
                AccessError::MissingToken,
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn test_well_formed_garbage_is_unauthenticated() {
        let (access, _) = middleware();

        assert_eq!(
            access.require_auth(Some("Bearer abc.def.ghi")).unwrap_err(),
            AccessError::Unauthenticated
        );
    }

    #[test]
    fn test_valid_token_yields_meta() {
        let (access, tokens) = middleware();
        let token = tokens.create_token(&admin()).unwrap();

        let meta = access
            .require_auth(Some(&format!("Bearer {}", token)))
            .unwrap();
        assert_eq!(meta, admin());
    }

    #[test]
    fn test_any_scheme_word_is_accepted() {
        let (access, tokens) = middleware();
        let token = tokens.create_token(&admin()).unwrap();

        for scheme in ["Token", "JWT", "bearer"] {
            let meta = access
                .require_auth(Some(&format!("{} {}", scheme, token)))
                .unwrap();
            assert_eq!(meta, admin(), "scheme {}", scheme);
        }
    }

    #[test]
    fn test_other_scheme_with_garbage_is_unauthenticated() {
        let (access, _) = middleware();

        assert_eq!(
            access.require_auth(Some("Basic dXNlcjpwYXNz")).unwrap_err(),
            AccessError::Unauthenticated
        );
    }

    #[test]
    fn test_token_from_other_issuer_is_unauthenticated() {
        let (access, _) = middleware();
        let other = JwtService::new(JwtConfig::new("someone-else", 1)).unwrap();
        let token = other.create_token(&admin()).unwrap();

        assert_eq!(
            access.require_auth(Some(&format!("Bearer {}", token))).unwrap_err(),
            AccessError::Unauthenticated
        );
    }

    #[test]
    fn test_role_match_is_exact() {
        let (access, _) = middleware();
        let meta = admin();

        assert!(access.require_role(&meta, "admin").is_ok());
        assert_eq!(access.require_role(&meta, "Admin"), Err(AccessError::Forbidden));
        assert_eq!(access.require_role(&meta, "adm"), Err(AccessError::Forbidden));
        assert_eq!(
            access.require_role(&AuthMeta::new(1, vec![]), "default"),
            Err(AccessError::Forbidden)
        );
    }
}
