use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

/// Minimum length of an operator-supplied session signing secret.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// HS256 signing secret. Empty means a random per-process secret.
    pub secret: String,
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub allow_staff_registration: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5002)?
            .set_default("server.workers", 4)?
            .set_default("database.url", "sqlite://bloodbank.db")?
            .set_default("database.max_connections", 5)?
            .set_default("session.secret", "")?
            .set_default("session.cookie_name", "bloodbank_session")?
            .set_default("session.ttl_hours", 12)?
            .set_default("session.secure_cookie", false)?
            .set_default("auth.allow_staff_registration", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("BLOODBANK").separator("__"));

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(secret) = env::var("SESSION_SECRET") {
            builder = builder.set_override("session.secret", secret)?;
        }

        if let Ok(port) = env::var("BLOODBANK_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("At least one worker is required".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        if !self.session.secret.is_empty() && self.session.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(format!(
                "Session secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            ));
        }

        if self.session.cookie_name.is_empty() {
            return Err("Session cookie name is required".to_string());
        }

        if self.session.ttl_hours <= 0 {
            return Err("Session TTL must be positive".to_string());
        }

        Ok(())
    }
}
