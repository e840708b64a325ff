use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Listing fees, listing lifetime and notification targets
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Minimum fee for books and stationery (smallest token unit)
    pub fixed_fee: i64,
    /// Flat fee for flats, restaurants and events
    pub monthly_fee: i64,
    /// Share of the MRP charged for books and stationery, in percent
    pub fee_rate_percent: u32,
    pub listing_ttl_days: i64,
    pub sweep_interval_secs: u64,
    pub notify_webhook_url: Option<String>,
    pub audit_log_dir: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub log_level: String,
    pub environment: String,
}

/// Unset falls back to `default`; set but unparseable is an error
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("Invalid {}: {}", key, raw)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(format!("Invalid {}: not unicode", key)),
    }
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;
        let acquire_timeout_secs = env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64)?;
        let idle_timeout_secs = env_or("DATABASE_IDLE_TIMEOUT_SECS", 600u64)?; // 10 minutes
        let max_lifetime_secs = env_or("DATABASE_MAX_LIFETIME_SECS", 1800u64)?; // 30 minutes
        let test_before_acquire = env_or("DATABASE_TEST_BEFORE_ACQUIRE", true)?;

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/campus_market".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl MarketConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let config = Self {
            fixed_fee: env_or("LISTING_FIXED_FEE", defaults.fixed_fee)?,
            monthly_fee: env_or("LISTING_MONTHLY_FEE", defaults.monthly_fee)?,
            fee_rate_percent: env_or("LISTING_FEE_RATE_PERCENT", defaults.fee_rate_percent)?,
            listing_ttl_days: env_or("LISTING_TTL_DAYS", defaults.listing_ttl_days)?,
            sweep_interval_secs: env_or(
                "EXPIRY_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            audit_log_dir: env::var("AUDIT_LOG_DIR").unwrap_or(defaults.audit_log_dir),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fixed_fee <= 0 || self.monthly_fee <= 0 {
            return Err("Listing fees must be greater than 0".to_string());
        }
        if self.fee_rate_percent == 0 || self.fee_rate_percent > 100 {
            return Err("LISTING_FEE_RATE_PERCENT must be between 1 and 100".to_string());
        }
        if self.listing_ttl_days <= 0 {
            return Err("LISTING_TTL_DAYS must be greater than 0".to_string());
        }
        if self.sweep_interval_secs == 0 {
            return Err("EXPIRY_SWEEP_INTERVAL_SECS must be greater than 0".to_string());
        }
        if let Some(url) = &self.notify_webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Invalid NOTIFY_WEBHOOK_URL: {}", url));
            }
        }
        Ok(())
    }

    pub fn listing_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.listing_ttl_days)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fixed_fee: 20,
            monthly_fee: 100,
            fee_rate_percent: 10,
            listing_ttl_days: 30,
            sweep_interval_secs: 300,
            notify_webhook_url: None,
            audit_log_dir: "./logs".to_string(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let market = MarketConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            market,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            market: MarketConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
        }
    }
}
