//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (optional permission cache)
    pub redis: RedisSettings,

    /// Session token verification settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Task locking and mapper level rules
    pub tasks: TaskSettings,

    /// Log output format ("pretty" or "json")
    pub log_format: String,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Run pending migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL; permission caching is disabled when unset
    pub url: Option<String>,

    /// Seconds a project manager permission check stays cached
    pub permission_ttl_secs: u64,
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key tokens are signed with
    pub secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Task locking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSettings {
    /// How long a lock lasts before it may be auto-unlocked
    pub lock_duration_minutes: i64,

    /// Interval between expired-lock sweeps
    pub auto_unlock_interval_secs: u64,

    /// Mapped tasks needed to become an intermediate mapper
    pub intermediate_level_tasks: i64,

    /// Mapped tasks needed to become an advanced mapper
    pub advanced_level_tasks: i64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            lock_duration_minutes: 120,
            auto_unlock_interval_secs: 300,
            intermediate_level_tasks: 250,
            advanced_level_tasks: 500,
        }
    }
}

impl TaskSettings {
    pub fn lock_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lock_duration_minutes)
    }
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the token secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("log_format", "pretty")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.permission_ttl_secs", 60)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("tasks.lock_duration_minutes", 120)?
            .set_default("tasks.auto_unlock_interval_secs", 300)?
            .set_default("tasks.intermediate_level_tasks", 250)?
            .set_default("tasks.advanced_level_tasks", 500)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=5000 -> server.port = 5000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.check()?;
                Ok(settings)
            })
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.tasks.lock_duration_minutes <= 0 {
            return Err(ConfigError::Message(
                "tasks.lock_duration_minutes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> Settings {
        Settings {
            server: ServerSettings { host: "127.0.0.1".into(), port: 5000 },
            database: DatabaseSettings {
                url: "postgres://localhost/tm".into(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout: 1,
                run_migrations: false,
            },
            redis: RedisSettings { url: None, permission_ttl_secs: 60 },
            jwt: JwtSettings { secret: secret.into() },
            cors: CorsSettings { allowed_origins: vec![] },
            tasks: TaskSettings::default(),
            log_format: "pretty".into(),
            environment: "test".into(),
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(settings("short").check().is_err());
        assert!(settings(&"s".repeat(MIN_JWT_SECRET_LENGTH)).check().is_ok());
    }

    #[test]
    fn test_server_addr() {
        assert_eq!(settings(&"s".repeat(40)).server_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn test_default_lock_duration() {
        assert_eq!(TaskSettings::default().lock_duration(), chrono::Duration::hours(2));
    }
}
