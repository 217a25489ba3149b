//! Decode-only JWT claim extraction.
//!
//! The core never mints tokens; it only needs "given a token, extract the
//! subject, role, and tenant claims". Signature and expiry validation are
//! delegated to `jsonwebtoken`.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use quill_core::TenantId;

/// Value of the `typ` claim for access tokens. Refresh tokens must never
/// authenticate a request.
pub const TOKEN_TYPE_ACCESS: &str = "access";

/// Claims the platform embeds in its tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username.
    pub sub: String,
    /// User id.
    pub uid: i64,
    /// Stable role string.
    pub role: String,
    /// Tenant id claim; absent on platform-level tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<TenantId>,
    /// Tenant code claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcode: Option<String>,
    /// Token type: `access` or `refresh`.
    pub typ: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// Validates and decodes bearer tokens.
pub struct TokenDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl TokenDecoder {
    /// Build a decoder over the shared HMAC secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode and validate a token.
    ///
    /// # Errors
    ///
    /// Returns the underlying `jsonwebtoken` error on bad signature, expiry,
    /// or malformed structure.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: &TokenClaims) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: "alice".to_string(),
            uid: 11,
            role: "EDITOR".to_string(),
            tid: Some(7),
            tcode: Some("acme".to_string()),
            typ: TOKEN_TYPE_ACCESS.to_string(),
            exp: 4_102_444_800, // far future
        }
    }

    #[test]
    fn decodes_valid_token() {
        let decoder = TokenDecoder::new(SECRET);
        let decoded = decoder.decode(&mint(&claims())).unwrap();
        assert_eq!(decoded.sub, "alice");
        assert_eq!(decoded.tid, Some(7));
        assert_eq!(decoded.tcode.as_deref(), Some("acme"));
        assert_eq!(decoded.typ, TOKEN_TYPE_ACCESS);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint(&claims());
        let decoder = TokenDecoder::new(b"other-secret");
        assert!(decoder.decode(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let mut expired = claims();
        expired.exp = 1_000_000; // 1970s
        let decoder = TokenDecoder::new(SECRET);
        assert!(decoder.decode(&mint(&expired)).is_err());
    }

    #[test]
    fn tenant_claims_are_optional() {
        let mut platform = claims();
        platform.tid = None;
        platform.tcode = None;
        let decoder = TokenDecoder::new(SECRET);
        let decoded = decoder.decode(&mint(&platform)).unwrap();
        assert_eq!(decoded.tid, None);
    }
}
