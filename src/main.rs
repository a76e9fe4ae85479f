mod auth;
mod config;
mod db;
mod error;
mod export;
mod http_api;
mod models;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use config::Config;
use db::Database;
use http_api::AppState;
use services::{BlobStore, SupabaseStorage};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_RETENTION_DAYS: u64 = 7;

/// Remove log files older than `max_age_days`.
fn cleanup_old_logs(log_dir: &str, max_age_days: u64) {
    let log_path = std::path::Path::new(log_dir);
    if !log_path.exists() {
        return;
    }

    let max_age = std::time::Duration::from_secs(max_age_days * 24 * 60 * 60);
    let now = std::time::SystemTime::now();

    if let Ok(entries) = std::fs::read_dir(log_path) {
        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }
}

/// Daily background cleanup of the log directory.
fn spawn_log_cleanup_task(log_dir: String) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS);
            tracing::debug!("Log cleanup completed");
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    cleanup_old_logs(&config.log_dir, LOG_RETENTION_DAYS);

    // Console + daily rolling file
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    spawn_log_cleanup_task(config.log_dir.clone());

    info!("Connecting to database...");
    let database = Database::connect(&config.database_url).await?;
    info!("Database connected successfully");

    let http = reqwest::Client::new();
    let storage: Option<Arc<dyn BlobStore>> = match &config.storage {
        Some(storage_config) => {
            info!(
                "Supporting images stored in bucket {}",
                storage_config.bucket
            );
            let store: Arc<dyn BlobStore> =
                Arc::new(SupabaseStorage::new(http.clone(), storage_config.clone()));
            Some(store)
        }
        None => {
            info!("SUPABASE_URL not set, supporting images stay inline");
            None
        }
    };

    let state = AppState::new(
        database,
        auth::JwtKeys::new(&config.jwt_secret, config.jwt_expire_minutes),
        config.allow_admin_registration,
        storage,
        http,
    );
    let router = http_api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    serve(addr, router, config.tls_cert_path, config.tls_key_path).await?;

    Ok(())
}

/// Serve over HTTPS when both TLS paths are set, plain HTTP otherwise.
async fn serve(
    addr: SocketAddr,
    router: axum::Router,
    tls_cert_path: Option<String>,
    tls_key_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (tls_cert_path, tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            info!("HTTPS API server listening on {}", addr);
            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
                    .await
                    .map_err(|e| format!("Failed to load TLS config: {}", e))?;

            axum_server::bind_rustls(addr, tls_config)
                .serve(router.into_make_service())
                .await?;
        }
        _ => {
            info!("HTTP API server listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_ignores_missing_directory() {
        cleanup_old_logs("definitely/not/a/log/dir", LOG_RETENTION_DAYS);
    }

    #[test]
    fn cleanup_keeps_fresh_files() {
        let dir = std::env::temp_dir().join(format!("logbook-logs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("server.log");
        std::fs::write(&file, "fresh").unwrap();

        cleanup_old_logs(dir.to_str().unwrap(), LOG_RETENTION_DAYS);
        assert!(file.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
