//! Runtime configuration, read once from the environment at startup.

use std::{env, path::PathBuf, str::FromStr};

use bcrypt::{hash, DEFAULT_COST};
use thiserror::Error;

use crate::store::{file::DEFAULT_LOCATION_CAP, remote::DbConfig};

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";
pub const DEFAULT_GEO_LOOKUP_URL: &str = "http://ip-api.com";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,

    #[error("Failed to hash ADMIN_PASSWORD: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Which persistence path serves the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Remote,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::File => "file",
            StorageBackend::Remote => "remote",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "local" => Ok(StorageBackend::File),
            "remote" | "hosted" => Ok(StorageBackend::Remote),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub location_cap: usize,
    pub database: DbConfig,
    pub storage_url: Option<String>,
    pub storage_service_key: Option<String>,
}

impl StorageConfig {
    /// Flat-file storage rooted at the given directories.
    pub fn file(data_dir: impl Into<PathBuf>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: data_dir.into(),
            public_dir: public_dir.into(),
            location_cap: DEFAULT_LOCATION_CAP,
            database: DbConfig::default(),
            storage_url: None,
            storage_service_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// bcrypt hash of the admin password; `None` disables login.
    pub admin_password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub geo_lookup_url: String,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub logging: LogConfig,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    parse_value(key, var(key), default)
}

fn parse_value<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// `true/false`, `1/0`, `yes/no`.
fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

fn database_config() -> Result<DbConfig, ConfigError> {
    let defaults = DbConfig::default();
    Ok(DbConfig {
        url: var("DATABASE_URL").unwrap_or(defaults.url),
        max_connections: parse_var("DB_POOL_MAX", defaults.max_connections)?,
        min_connections: parse_var("DB_POOL_MIN", defaults.min_connections)?,
        connect_timeout_secs: parse_var("DB_CONNECT_TIMEOUT", defaults.connect_timeout_secs)?,
        idle_timeout_secs: parse_var("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
        migrate: parse_flag("DB_MIGRATE", var("DB_MIGRATE"), defaults.migrate)?,
    })
}

/// `ALLOWED_ORIGINS` (comma separated) or `FRONTEND_ORIGIN`, else the local
/// dev frontends.
fn allowed_origins() -> Vec<String> {
    let origins: Vec<String> = var("ALLOWED_ORIGINS")
        .map(|s| {
            s.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !origins.is_empty() {
        return origins;
    }
    if let Some(origin) = var("FRONTEND_ORIGIN") {
        return vec![origin];
    }
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse().map_err(|value| ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value,
            })?,
            None => StorageBackend::File,
        };

        let admin_password_hash = match (var("ADMIN_HASH_PASSWORD"), var("ADMIN_PASSWORD")) {
            (Some(hashed), _) => Some(hashed),
            (None, Some(plain)) => Some(hash(plain, DEFAULT_COST)?),
            (None, None) => None,
        };

        let config = Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var("PORT", 4000)?,
            environment,
            storage: StorageConfig {
                backend,
                data_dir: var("DATA_DIR").unwrap_or_else(|| "data".into()).into(),
                public_dir: var("PUBLIC_DIR").unwrap_or_else(|| "public".into()).into(),
                location_cap: parse_var("LOCATION_CAP", DEFAULT_LOCATION_CAP)?,
                database: database_config()?,
                storage_url: var("STORAGE_URL"),
                storage_service_key: var("STORAGE_SERVICE_KEY"),
            },
            auth: AuthConfig {
                jwt_secret: var("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
                token_ttl_hours: parse_var("TOKEN_TTL_HOURS", 12)?,
                admin_password_hash,
            },
            geo_lookup_url: var("GEO_LOOKUP_URL")
                .unwrap_or_else(|| DEFAULT_GEO_LOOKUP_URL.to_string()),
            allowed_origins: allowed_origins(),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            logging: LogConfig {
                dir: var("LOG_DIR").unwrap_or_else(|| "logs".into()).into(),
                level: var("LOG_LEVEL"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Refuse to start in production with the default JWT secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.auth.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        Ok(())
    }

    /// Startup warnings for settings that work but should not ship.
    pub fn log_warnings(&self) {
        if self.auth.admin_password_hash.is_none() {
            tracing::warn!(
                "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
                 Admin login is disabled."
            );
        }
        if self.storage.backend == StorageBackend::Remote
            && self.storage.storage_service_key.is_none()
        {
            tracing::warn!("STORAGE_SERVICE_KEY is not set; object uploads will be rejected");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use super::*;

    pub const TEST_PASSWORD: &str = "correct horse";

    /// Flat-file config rooted in `dir` with a cheap bcrypt hash.
    pub fn config(dir: &Path) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            storage: StorageConfig::file(dir.join("data"), dir.join("public")),
            auth: AuthConfig {
                jwt_secret: "test-secret".into(),
                token_ttl_hours: 1,
                admin_password_hash: Some(hash(TEST_PASSWORD, 4).unwrap()),
            },
            geo_lookup_url: "http://127.0.0.1:1".into(),
            allowed_origins: vec!["http://localhost:3000".into()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            logging: LogConfig {
                dir: dir.join("logs"),
                level: None,
            },
        }
    }
}
