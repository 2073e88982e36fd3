use std::path::Path;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Role, User, UserStatus};

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub status: UserStatus,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
    /// Token id, the key used to revoke it
    pub jti: String,
}

impl Claims {
    pub fn new(user: &User, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id: user.id.clone(),
            status: user.status,
            roles: user.roles.clone(),
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token verification failed: {0}")]
    Verification(String),

    #[error("token is missing the `{0}` claim")]
    MissingClaim(&'static str),

    #[error("token generation failed: {0}")]
    Generation(String),

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

pub const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 72;

/// Issues and verifies session tokens
pub trait TokenAuthority: Send + Sync {
    fn create_token(&self, claims: &Claims) -> Result<String, TokenError>;

    fn verify_token(&self, token: &str) -> Result<Claims, TokenError>;

    fn expiry_hours(&self) -> u64 {
        DEFAULT_TOKEN_EXPIRY_HOURS
    }

    /// Sign a fresh token for `user`
    fn create_session_token(&self, user: &User) -> Result<String, TokenError> {
        self.create_token(&Claims::new(user, self.expiry_hours()))
    }
}

/// RS512-signed JWTs
pub struct JwtTokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_hours: u64,
}

impl JwtTokenAuthority {
    pub fn from_pem(private_key: &[u8], public_key: &[u8]) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key)
            .map_err(|e| TokenError::InvalidKey(format!("private key: {}", e)))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key)
            .map_err(|e| TokenError::InvalidKey(format!("public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation: Validation::new(Algorithm::RS512),
            expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
        })
    }

    pub fn with_expiry_hours(mut self, expiry_hours: u64) -> Self {
        self.expiry_hours = expiry_hours;
        self
    }

    pub fn from_files(private_key_path: impl AsRef<Path>, public_key_path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let read = |path: &Path| {
            std::fs::read(path)
                .map_err(|e| TokenError::InvalidKey(format!("{}: {}", path.display(), e)))
        };
        let private_key = read(private_key_path.as_ref())?;
        let public_key = read(public_key_path.as_ref())?;
        Self::from_pem(&private_key, &public_key)
    }
}

impl TokenAuthority for JwtTokenAuthority {
    fn create_token(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::RS512), claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    fn expiry_hours(&self) -> u64 {
        self.expiry_hours
    }

    fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Verification(e.to_string()))?
            .claims;

        if claims.user_id.is_empty() {
            return Err(TokenError::MissingClaim("user_id"));
        }
        if claims.jti.is_empty() {
            return Err(TokenError::MissingClaim("jti"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &[u8] = include_bytes!("../../keys/demo.rsa");
    const PUBLIC_KEY: &[u8] = include_bytes!("../../keys/demo.rsa.pub");

    fn authority() -> JwtTokenAuthority {
        JwtTokenAuthority::from_pem(PRIVATE_KEY, PUBLIC_KEY).unwrap()
    }

    fn active_user() -> User {
        let mut user = User::pending("alice", "alice@example.com");
        user.status = UserStatus::Active;
        user.roles = vec![Role::User];
        user
    }

    #[test]
    fn issued_tokens_verify() {
        let authority = authority();
        let claims = Claims::new(&active_user(), 72);
        let token = authority.create_token(&claims).unwrap();

        let verified = authority.verify_token(&token).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.exp - verified.iat, 72 * 3600);
    }

    #[test]
    fn session_tokens_use_configured_expiry() {
        let authority = authority().with_expiry_hours(2);
        let token = authority.create_session_token(&active_user()).unwrap();
        let claims = authority.verify_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 2 * 3600);
        assert_eq!(claims.roles, vec![Role::User]);
    }

    #[test]
    fn every_token_gets_a_fresh_jti() {
        let user = active_user();
        assert_ne!(Claims::new(&user, 1).jti, Claims::new(&user, 1).jti);
    }

    #[test]
    fn tampered_and_expired_tokens_fail() {
        let authority = authority();
        let mut claims = Claims::new(&active_user(), 1);
        let token = authority.create_token(&claims).unwrap();
        let tampered = format!("{}x", token);
        assert!(matches!(
            authority.verify_token(&tampered),
            Err(TokenError::Verification(_))
        ));

        claims.iat -= 7200;
        claims.exp -= 7200;
        let expired = authority.create_token(&claims).unwrap();
        assert!(authority.verify_token(&expired).is_err());
    }

    #[test]
    fn unreadable_key_files_are_reported() {
        let result = JwtTokenAuthority::from_files("/nonexistent/key", "/nonexistent/key.pub");
        assert!(matches!(result, Err(TokenError::InvalidKey(_))));
    }
}
