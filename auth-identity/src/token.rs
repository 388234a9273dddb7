use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::models::Role;

/// JWT claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
}

impl TokenClaims {
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidToken`] when `sub` is not a UUID.
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| IdentityError::InvalidToken)
    }
}

/// Issues and validates HS256 tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::JwtError`] if encoding fails.
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<(String, DateTime<Utc>)> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::JwtError`] if encoding fails.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::JwtError(e.to_string()))?;
        Ok((token, expires_at))
    }

    /// Decode and check signature and expiry
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidToken`] for any malformed, forged or
    /// expired token.
    pub fn validate(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| IdentityError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate() {
        let tokens = TokenService::new("test-secret", 720);
        let user_id = Uuid::new_v4();
        let (token, expires_at) = tokens.issue(user_id, Role::Patient).unwrap();

        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role, Role::Patient);
        assert_eq!(claims.exp, expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("test-secret", 1);
        let (token, _) = tokens
            .issue_at(Uuid::new_v4(), Role::Admin, Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(tokens.validate(&token), Err(IdentityError::InvalidToken)));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = TokenService::new("ours", 1);
        let theirs = TokenService::new("theirs", 1);
        let (token, _) = theirs.issue(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(ours.validate(&token).is_err());
    }
}
