use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Runtime settings, read once at startup from the environment
/// (a `.env` file is loaded before this runs).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub products_file: PathBuf,
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password_hash: String,
    pub token_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid PORT: {}", e)))?;

        let products_file = env::var("PRODUCTS_FILE")
            .unwrap_or_else(|_| "data/products-store.json".to_string())
            .into();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET must be set".to_string()))?;

        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

        // An argon2-encoded hash, as printed by the `hash-password` helper.
        // There is deliberately no plaintext fallback.
        let admin_password_hash = env::var("ADMIN_PASSWORD_HASH")
            .map_err(|_| AppError::Config("ADMIN_PASSWORD_HASH must be set".to_string()))?;

        let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .map_err(|e| AppError::Config(format!("Invalid TOKEN_TTL_HOURS: {}", e)))?;

        Ok(AppConfig {
            host,
            port,
            products_file,
            jwt_secret,
            admin_username,
            admin_password_hash,
            token_ttl_hours,
        })
    }
}
