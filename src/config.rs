use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "change-this-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_port: u16,
    pub jwt_secret: String,
    pub jwt_expire_minutes: i64,
    pub allow_admin_registration: bool,
    pub storage: Option<StorageConfig>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub log_level: String,
    pub log_dir: String,
}

/// Supabase Storage credentials; present only when both URL and key are set.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://logbook.db?mode=rwc".to_string());

        let http_port = parse_var("HTTP_PORT", 8001)?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using the built-in development secret");
            DEFAULT_JWT_SECRET.to_string()
        });
        let jwt_expire_minutes = parse_var("JWT_EXPIRE_MINUTES", 60)?;
        let allow_admin_registration = parse_var("ALLOW_ADMIN_REGISTRATION", false)?;

        let storage = match (
            non_empty_var("SUPABASE_URL"),
            non_empty_var("SUPABASE_SERVICE_ROLE_KEY"),
        ) {
            (Some(url), Some(service_role_key)) => Some(StorageConfig {
                url: url.trim_end_matches('/').to_string(),
                service_role_key,
                bucket: env::var("SUPABASE_STORAGE_BUCKET")
                    .unwrap_or_else(|_| "logbook-images".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            http_port,
            jwt_secret,
            jwt_expire_minutes,
            allow_admin_registration,
            storage,
            tls_cert_path: non_empty_var("TLS_CERT_PATH"),
            tls_key_path: non_empty_var("TLS_KEY_PATH"),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
