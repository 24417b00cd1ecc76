//! Platform authentication helpers.
//!
//! The payroll surfaces are guarded by a single configured account. The
//! password is kept only as an argon2 hash; HTTP callers trade it for a
//! short-lived HS256 session token.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("invalid session token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Fixed username/password pair checked before the ledger is opened.
#[derive(Clone, Debug)]
pub struct CredentialGate {
    username: String,
    password_hash: String,
}

impl CredentialGate {
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, AuthnError> {
        Ok(Self {
            username: username.into(),
            password_hash: hash_password(password)?,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthnError> {
        let parsed = PasswordHash::new(&self.password_hash)
            .map_err(|err| AuthnError::Hash(err.to_string()))?;
        let password_ok = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        if username == self.username && password_ok {
            Ok(())
        } else {
            warn!(username, "rejected login attempt");
            Err(AuthnError::InvalidCredentials)
        }
    }
}

fn hash_password(password: &str) -> Result<String, AuthnError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::Hash(err.to_string()))
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
}

impl SessionConfig {
    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(username: &str, config: &SessionConfig) -> Result<String, AuthnError> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.session_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: username.to_string(),
        exp,
        iat: now.timestamp() as usize,
    };
    Ok(jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &config.encoding_key(),
    )?)
}

pub fn decode_token(token: &str, config: &SessionConfig) -> Result<SessionClaims, AuthnError> {
    let data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &config.decoding_key(),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
