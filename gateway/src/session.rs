//! Signed session tokens.
//!
//! A session token carries a previously resolved principal, upstream
//! access token included, signed with the process-wide secret. Presenting
//! a valid one lets a request skip both credential resolution and the
//! upstream exchange. `exp` is always `iat` plus the upstream token's own
//! lifetime, so a session never outlives the token embedded in it.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Resolved upstream username
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: u64,
    /// Expiry (unix seconds)
    pub exp: u64,
    /// Upstream bearer token resolved for this session
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Tenant base URL, when the exchange returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("system clock is before the unix epoch")]
    Clock,
}

/// HS256 key pair derived from the process signing secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Decode and verify a session token, expiry included.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        Ok(decode::<SessionClaims>(token, &self.decoding, &self.validation)?.claims)
    }
}

pub fn unix_now() -> Result<u64, SessionError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|_| SessionError::Clock)
}
