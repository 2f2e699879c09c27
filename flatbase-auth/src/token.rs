use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// The claim's `type` field, distinguishing an access token from a
/// refresh token so one can never be presented in place of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    token_type: TokenType,
    exp: i64,
}

/// Issues and verifies the HS256 JWTs that back sessions. Holds only the
/// signing secret and the two token lifetimes; it is stateless otherwise
/// (no revocation list — a rotated refresh token simply stops matching
/// the session's current value, which the session manager enforces).
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// A freshly minted or refreshed access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, access_minutes: i64, refresh_days: i64) -> Self {
        TokenIssuer {
            secret: secret.into(),
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(refresh_days),
        }
    }

    pub fn issue(&self, user_name: &str) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.encode(user_name, TokenType::Access, self.access_ttl)?,
            refresh_token: self.encode(user_name, TokenType::Refresh, self.refresh_ttl)?,
        })
    }

    fn encode(&self, user_name: &str, token_type: TokenType, ttl: Duration) -> AuthResult<String> {
        let claims = Claims {
            sub: user_name.to_string(),
            token_type,
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AuthError::internal(format!("failed to sign token: {e}")))
    }

    /// Decode and verify a token's signature and expiry, without regard
    /// to its declared type. `jsonwebtoken`'s default validation already
    /// rejects an expired `exp`, which is what distinguishes "expired"
    /// from "malformed" for our callers: both surface as an error here,
    /// but [`Self::decode_unexpired`] below needs to tell them apart.
    fn decode_claims(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AuthError::unauthorized(format!("invalid token: {e}")))
    }

    /// Verify `token` is a non-expired access token and return its subject.
    pub fn verify_access(&self, token: &str) -> AuthResult<String> {
        let claims = self.decode_claims(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::unauthorized("expected an access token"));
        }
        Ok(claims.sub)
    }

    /// Verify `token` is a non-expired refresh token and return its subject.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<String> {
        let claims = self.decode_claims(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::unauthorized("expected a refresh token"));
        }
        Ok(claims.sub)
    }

    /// True if `token` decodes as a structurally valid access token whose
    /// `exp` has not yet passed. Used by refresh to reject "still valid"
    /// access tokens with a programming-error rather than silently
    /// reissuing.
    pub fn access_token_is_live(&self, token: &str) -> bool {
        self.decode_claims(token)
            .map(|c| c.token_type == TokenType::Access)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret".to_vec(), 15, 30)
    }

    #[test]
    fn issues_and_verifies_access_token() {
        let issuer = issuer();
        let pair = issuer.issue("alice").unwrap();
        assert_eq!(issuer.verify_access(&pair.access_token).unwrap(), "alice");
    }

    #[test]
    fn access_token_rejected_as_refresh() {
        let issuer = issuer();
        let pair = issuer.issue("alice").unwrap();
        assert!(issuer.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let issuer = issuer();
        let pair = issuer.issue("alice").unwrap();
        assert!(issuer.verify_access(&pair.refresh_token).is_err());
    }

    #[test]
    fn live_access_token_is_detected() {
        let issuer = issuer();
        let pair = issuer.issue("alice").unwrap();
        assert!(issuer.access_token_is_live(&pair.access_token));
        assert!(!issuer.access_token_is_live(&pair.refresh_token));
    }

    #[test]
    fn expired_access_token_is_not_live() {
        let issuer = TokenIssuer::new(b"test-secret".to_vec(), -1, 30);
        let pair = issuer.issue("alice").unwrap();
        assert!(!issuer.access_token_is_live(&pair.access_token));
        assert!(issuer.verify_access(&pair.access_token).is_err());
    }
}
