//! JWT access and refresh tokens (HS256).
//!
//! Access tokens authorize API calls; refresh tokens only mint new access
//! tokens and can be revoked by `jti` at logout.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use cartwheel_core::UserId;

use crate::config::TokenConfig;
use crate::models::User;

/// Errors from issuing or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, format or expiry check failed.
    #[error("Token is invalid or expired")]
    Invalid,

    /// A refresh token was presented where an access token was expected, or
    /// the other way round.
    #[error("Token has wrong type")]
    WrongType,

    /// The refresh token was revoked at logout.
    #[error("Token is blacklisted")]
    Revoked,

    /// Signing failed.
    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Which kind of token a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a string per RFC 7519.
    pub sub: String,
    pub email: String,
    pub is_staff: bool,
    pub token_type: TokenType,
    /// Unique token ID, used for revocation.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The user this token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| TokenError::Invalid)
    }

    /// When the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// An access/refresh pair returned at login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies JWTs.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service from configuration.
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Issue an access and refresh token for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user, TokenType::Access)?,
            refresh: self.issue(user, TokenType::Refresh)?,
        })
    }

    /// Issue a single token of the given type.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue(&self, user: &User, token_type: TokenType) -> Result<String, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let now = Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)] // TTLs are validated to small values at startup
        let exp = now + ttl.as_secs() as i64;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.as_str().to_owned(),
            is_staff: user.is_staff,
            token_type,
            jti: Uuid::new_v4(),
            iat: now,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Encoding)
    }

    /// Verify a token's signature, expiry and type.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for bad or expired tokens and
    /// `TokenError::WrongType` if the type does not match `expected`.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|_| TokenError::Invalid)?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwheel_core::{Email, Username};
    use secrecy::SecretString;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig {
            secret: SecretString::from("q8Z!vR2#kL9@wX4$mN7%pT1^sB6&yC3*"),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(604_800),
        })
    }

    fn user(is_staff: bool) -> User {
        User {
            id: UserId::new(42),
            email: Email::parse("jo@example.com").unwrap(),
            username: Username::parse("jo").unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            date_of_birth: None,
            address: None,
            is_staff,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify_access() {
        let tokens = service();
        let pair = tokens.issue_pair(&user(true)).unwrap();

        let claims = tokens.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.email, "jo@example.com");
        assert!(claims.is_staff);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue_pair(&user(false)).unwrap();

        assert!(matches!(
            tokens.verify(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType)
        ));
        assert!(tokens.verify(&pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn test_pair_has_distinct_jtis() {
        let tokens = service();
        let pair = tokens.issue_pair(&user(false)).unwrap();
        let access = tokens.verify(&pair.access, TokenType::Access).unwrap();
        let refresh = tokens.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = service();
        let pair = tokens.issue_pair(&user(false)).unwrap();
        let mut tampered = pair.access.clone();
        tampered.push('x');

        assert!(matches!(
            tokens.verify(&tampered, TokenType::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = TokenService::new(&TokenConfig {
            secret: SecretString::from("Zx7#Qw2!Er9@Ty4$Ui1%Op6^As3&Df8*"),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(1800),
        });
        let pair = other.issue_pair(&user(false)).unwrap();

        assert!(matches!(
            service().verify(&pair.access, TokenType::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "42".to_string(),
            email: "jo@example.com".to_string(),
            is_staff: false,
            token_type: TokenType::Access,
            jti: Uuid::new_v4(),
            iat: now - 1000,
            exp: now - 100,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &tokens.encoding).unwrap();

        assert!(matches!(
            tokens.verify(&token, TokenType::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let claims = Claims {
            sub: "abc".to_string(),
            email: String::new(),
            is_staff: false,
            token_type: TokenType::Access,
            jti: Uuid::new_v4(),
            iat: 0,
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }
}
