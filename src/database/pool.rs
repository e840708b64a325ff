use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use thiserror::Error;

/// Directory searched when no migrations path is given
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Failures while bringing the store up, before any market operation runs
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolCreation(sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Owns the pool shared by the PostgreSQL stores
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every connection; called once on shutdown
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open the pool and check that the server answers.
///
/// Called once at startup; the stores share the resulting pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .test_before_acquire(config.test_before_acquire)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    Ok(pool)
}

/// Apply pending migrations from `migrations_path`, or [`DEFAULT_MIGRATIONS_DIR`]
pub async fn run_migrations(
    pool: &PgPool,
    migrations_path: Option<&str>,
) -> Result<(), DatabaseError> {
    let dir = migrations_path.unwrap_or(DEFAULT_MIGRATIONS_DIR);
    let migrator = sqlx::migrate::Migrator::new(Path::new(dir)).await?;
    migrator.run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_migrations_dir_is_a_migration_error() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/campus_market_unused")
            .unwrap();

        let err = run_migrations(&pool, Some("./no-such-migrations-dir"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Migration(_)));
    }
}
