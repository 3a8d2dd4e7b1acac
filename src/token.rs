//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::{
    INVALID_TOKEN_PROVIDED, Result, ServerError, TOKEN_IS_INVALID,
};

const DEFAULT_AUDIENCE: &str = "gatekeeper";
const JTI_LENGTH: usize = 12;
pub const EXPIRATION_TIME: u64 = 60 * 60; // 1 hour.

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
    /// Unique token ID.
    pub jti: String,
}

impl Claims {
    /// User ID carried by the token. Zero or unparsable means anonymous.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse::<i64>().ok().filter(|id| *id != 0)
    }
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    name: String,
    audience: String,
    expiration: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] signing with an HMAC secret.
    pub fn new(name: &str, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(ServerError::Internal {
                details: "token secret must not be empty".into(),
                source: None,
            });
        }

        Ok(Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            name: name.to_owned(),
            audience: DEFAULT_AUDIENCE.to_string(),
            expiration: EXPIRATION_TIME,
        })
    }

    /// Set `audience` field on JWT.
    pub fn audience(&mut self, audience: &str) {
        self.audience = audience.to_owned();
    }

    /// Set token lifetime, in seconds.
    pub fn expiration(&mut self, seconds: u64) {
        self.expiration = seconds;
    }

    /// Token lifetime, in seconds.
    pub fn expires_in(&self) -> u64 {
        self.expiration
    }

    /// Create a new [`jsonwebtoken`] for `user_id`.
    pub fn create(&self, user_id: i64) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::Internal {
                details: "system clock is before unix epoch".into(),
                source: Some(Box::new(err)),
            })?
            .as_secs();
        let header = Header::new(self.algorithm);
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + self.expiration,
            iat: time,
            iss: self.name.clone(),
            sub: user_id.to_string(),
            jti: crate::crypto::random_hex(JTI_LENGTH),
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Decode and check a token.
    ///
    /// Structurally broken tokens and tokens that fail verification are
    /// reported with different messages.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        // expired means expired, no grace period.
        validation.leeway = 0;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.name]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => {
                    ServerError::Unauthorized(INVALID_TOKEN_PROVIDED)
                },
                _ => ServerError::Unauthorized(TOKEN_IS_INVALID),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new("https://accounts.example.com/", "secret").unwrap()
    }

    #[test]
    fn test_create_and_decode() {
        let token = manager();
        let jwt = token.create(42).unwrap();
        let claims = token.decode(&jwt).unwrap();

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.iss, "https://accounts.example.com/");
        assert_eq!(claims.exp - claims.iat, EXPIRATION_TIME);
    }

    #[test]
    fn test_tokens_are_unique() {
        let token = manager();
        assert_ne!(token.create(1).unwrap(), token.create(1).unwrap());
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            manager().decode("definitely not a jwt"),
            Err(ServerError::Unauthorized(INVALID_TOKEN_PROVIDED))
        ));
    }

    #[test]
    fn test_foreign_signature() {
        let other = TokenManager::new("https://accounts.example.com/", "other")
            .unwrap();
        let jwt = other.create(1).unwrap();

        assert!(matches!(
            manager().decode(&jwt),
            Err(ServerError::Unauthorized(TOKEN_IS_INVALID))
        ));
    }

    #[test]
    fn test_expired_token() {
        let token = manager();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            aud: DEFAULT_AUDIENCE.into(),
            exp: now - 30,
            iat: now - 3630,
            iss: "https://accounts.example.com/".into(),
            sub: "42".into(),
            jti: "expired".into(),
        };
        let jwt =
            encode(&Header::new(token.algorithm), &claims, &token.encoding_key)
                .unwrap();

        assert!(matches!(
            token.decode(&jwt),
            Err(ServerError::Unauthorized(TOKEN_IS_INVALID))
        ));
    }

    #[test]
    fn test_zero_id_is_anonymous() {
        let claims = Claims {
            sub: "0".into(),
            ..Default::default()
        };
        assert_eq!(claims.user_id(), None);
    }

    #[test]
    fn test_empty_secret() {
        assert!(TokenManager::new("issuer", "").is_err());
    }
}
