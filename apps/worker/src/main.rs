//! Opsgrid audit-retention worker.
//!
//! The serving API has no delete surface for audit events; this separate
//! privileged process is the only place expired events are removed.

#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use opsgrid_core::{AppError, AppResult};
use opsgrid_infrastructure::purge_expired_audit_events;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    retention_days: u32,
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    info!(
        retention_days = config.retention_days,
        sweep_interval_secs = config.sweep_interval_secs,
        "opsgrid-worker started"
    );

    loop {
        match purge_expired_audit_events(&pool, config.retention_days).await {
            Ok(deleted) => {
                if deleted == 0 {
                    info!("audit retention sweep found nothing to purge");
                }
            }
            Err(error) => {
                warn!(error = %error, "audit retention sweep failed");
            }
        }

        tokio::time::sleep(Duration::from_secs(config.sweep_interval_secs)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let retention_days = parse_env_u32("AUDIT_RETENTION_DAYS", 365)?;
        let sweep_interval_secs = parse_env_u64("SWEEP_INTERVAL_SECS", 3600)?;

        if retention_days == 0 {
            return Err(AppError::Validation(
                "AUDIT_RETENTION_DAYS must be greater than zero".to_owned(),
            ));
        }

        if sweep_interval_secs == 0 {
            return Err(AppError::Validation(
                "SWEEP_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            retention_days,
            sweep_interval_secs,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
