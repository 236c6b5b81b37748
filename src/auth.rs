//! Session authority: checks the configured admin identity and issues
//! bearer tokens that can later be verified by signature and expiry.

use argon2::{self, Config as ArgonConfig};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use rand::Rng;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Claims;

pub struct SessionAuthority {
    admin_username: String,
    admin_password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(
        admin_username: String,
        admin_password_hash: String,
        secret: &str,
        ttl_hours: i64,
    ) -> SessionAuthority {
        SessionAuthority {
            admin_username,
            admin_password_hash,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Verifies the credential pair and returns a signed bearer token.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String, AppError> {
        let password_ok =
            argon2::verify_encoded(&self.admin_password_hash, password.as_bytes()).unwrap_or(false);
        if username != self.admin_username || !password_ok {
            warn!("failed login attempt for {}", username);
            return Err(AppError::Auth("Invalid username or password".to_string()));
        }

        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to encode token: {}", e)))
    }

    /// Full signature and expiry check; anything else is an invalid token.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.validate(token).is_ok()
    }
}

/// Produces an argon2-encoded hash suitable for `ADMIN_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    argon2::hash_encoded(password.as_bytes(), &salt, &ArgonConfig::default())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}
