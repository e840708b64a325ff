//! Campus Market Worker
//!
//! Main entry point for the campus market background worker.
//! This process:
//! - Applies database migrations
//! - Wires the workflow services to PostgreSQL
//! - Runs the listing expiry sweep

use campus_market::config::AppConfig;
use campus_market::database::{create_pool, run_migrations, Database};
use campus_market::error::{AppError, AppResult};
use campus_market::notifications::{LogNotifier, NotificationDispatcher, WebhookNotifier};
use campus_market::services::AuditTrailService;
use campus_market::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("campus_market={},sqlx=warn", config.log_level).into()
    });

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("Campus market worker starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");
    let database = Database::new(pool);

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================
    let mut notifier = NotificationDispatcher::new().with_notifier(Arc::new(LogNotifier));

    match AuditTrailService::new(&config.market.audit_log_dir) {
        Ok(audit) => notifier = notifier.with_notifier(Arc::new(audit)),
        Err(e) => warn!("Audit trail disabled: {}", e),
    }

    if let Some(url) = &config.market.notify_webhook_url {
        notifier = notifier.with_notifier(Arc::new(WebhookNotifier::new(url.as_str())?));
        info!("Webhook notifications enabled: {}", url);
    }

    info!("{} notifiers registered", notifier.len());

    // =========================================================================
    // SERVICES AND BACKGROUND TASKS
    // =========================================================================
    let app_state = AppState::new(database.pool().clone(), &config.market, notifier);
    info!("Application state initialized");

    let sweeper = app_state.expiry_sweeper();
    let sweeper_handle = tokio::spawn(async move {
        sweeper.start().await;
    });
    info!(
        "Expiry sweeper started ({}s interval)",
        config.market.sweep_interval_secs
    );

    info!("Campus market worker ready, press Ctrl+C to shut down");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = sweeper_handle => {
            error!("Expiry sweeper exited unexpectedly");
        }
    }

    database.close().await;
    info!("Campus market worker shutdown complete");
    Ok(())
}
