use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("unique constraint {0} violated")]
    DuplicateKey(String),
    #[error("timed out waiting for a database connection")]
    PoolExhausted,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return StoreError::PoolExhausted;
        }
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return match db.constraint() {
                    Some(USERS_EMAIL_KEY) => StoreError::DuplicateEmail,
                    other => StoreError::DuplicateKey(other.unwrap_or("unknown").to_string()),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// PostgreSQL-backed implementation of the user and feedback stores.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bounded pool; acquiring a connection fails fast after the configured timeout.
pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(url)
        .await
        .context("connect to database")?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run database migrations")?;
    Ok(())
}
