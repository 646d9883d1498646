use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;

/// Payload shared by access and refresh tokens: the stringified user id and
/// an epoch-seconds expiry. Nothing else goes in a token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issues and validates the signed tokens for both token kinds. Keys and
/// algorithm are fixed at construction from process configuration; tokens
/// differ only in TTL.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Result<Self, TokenError> {
        let algorithm: Algorithm = config
            .algorithm
            .parse()
            .map_err(|_| TokenError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        // Keys are derived from a shared secret, so only the HMAC family is
        // accepted. This also shuts the door on algorithm-confusion input:
        // validation below only ever runs with this one algorithm.
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::UnsupportedAlgorithm(config.algorithm.clone()));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_expire_mins),
            refresh_ttl: Duration::minutes(config.refresh_token_expire_mins),
        })
    }

    /// Sign `{sub: user_id, exp: now + ttl}`. Deterministic apart from the
    /// expiry.
    pub fn issue(&self, user_id: i64, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_access(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue(user_id, self.access_ttl)
    }

    pub fn issue_refresh(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue(user_id, self.refresh_ttl)
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Verify signature and expiry, then extract the user id.
    /// [`TokenError::Expired`] and [`TokenError::Invalid`] are distinct so
    /// the boundary can tell clients to re-authenticate vs reject outright.
    pub fn validate(&self, token: &str) -> Result<i64, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })?;

        data.claims.sub.parse().map_err(|_| TokenError::Invalid)
    }
}
