//! Access token minting and verification (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::AuthError;
use crate::config::AuthConfig;
use crate::models::auth::AccessClaims;
use crate::uuid::uuidv7;

/// Why an access token was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Signature is good but `exp` has passed; the client should refresh.
    Expired,
    /// Anything else: bad signature, malformed token, wrong algorithm.
    Invalid(String),
}

impl From<VerifyError> for AuthError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Expired => AuthError::TokenExpired,
            VerifyError::Invalid(msg) => AuthError::TokenError(msg),
        }
    }
}

/// Signs and verifies access tokens carrying `{user_id, token_version}`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.access_token_ttl)
    }

    /// Generate a signed access token for `user_id` at `token_version`.
    pub fn mint(&self, user_id: &str, token_version: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("access token expiry out of range".into()))?;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            ver: token_version,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: uuidv7().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry, returning the claims on success.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, VerifyError> {
        self.decode_with(token, true)
    }

    /// Verify the signature only; an expired token is still returned.
    ///
    /// Used where the caller only needs to know *who* the token belongs to,
    /// e.g. logout with a stale access token.
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<AccessClaims, VerifyError> {
        self.decode_with(token, false)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<AccessClaims, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<AccessClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret-unit-test-secret";

    #[test]
    fn mint_then_verify_roundtrips_identity() {
        let codec = TokenCodec::new(SECRET, Duration::minutes(15));
        let token = codec.mint("user-1", 3).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.ver, 3);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_for_same_identity_are_unique() {
        let codec = TokenCodec::new(SECRET, Duration::minutes(15));
        let a = codec.mint("user-1", 1).unwrap();
        let b = codec.mint("user-1", 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_distinguished() {
        let codec = TokenCodec::new(SECRET, Duration::seconds(-60));
        let token = codec.mint("user-1", 1).unwrap();
        assert_eq!(codec.verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn expired_token_still_identifies_owner_when_expiry_ignored() {
        let codec = TokenCodec::new(SECRET, Duration::seconds(-60));
        let token = codec.mint("user-9", 4).unwrap();
        let claims = codec.verify_ignoring_expiry(&token).unwrap();
        assert_eq!(claims.sub, "user-9");
        assert_eq!(claims.ver, 4);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let minting = TokenCodec::new(SECRET, Duration::minutes(15));
        let other = TokenCodec::new(b"another-secret-another-secret-000", Duration::minutes(15));
        let token = minting.mint("user-1", 1).unwrap();
        assert!(matches!(other.verify(&token), Err(VerifyError::Invalid(_))));
        assert!(matches!(
            other.verify_ignoring_expiry(&token),
            Err(VerifyError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = TokenCodec::new(SECRET, Duration::minutes(15));
        assert!(matches!(codec.verify("not.a.jwt"), Err(VerifyError::Invalid(_))));
        assert!(matches!(codec.verify(""), Err(VerifyError::Invalid(_))));
    }

    #[test]
    fn unrepresentable_expiry_is_an_error_not_a_panic() {
        let codec = TokenCodec::new(SECRET, Duration::MAX);
        assert!(matches!(
            codec.mint("user-1", 1),
            Err(AuthError::Internal(_))
        ));
    }
}
