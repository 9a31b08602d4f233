//! Configuration management for the salon warehouse server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SALON_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{StockPolicy, UsagePolicy};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Log output configuration
    pub log: LogConfig,

    /// Warehouse business rules
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Run embedded migrations on startup outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// "pretty" or "json"
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    /// Let stock go below zero instead of rejecting the movement
    pub allow_negative_stock: bool,

    /// Take planned usage out of stock when it is recorded
    pub planned_usage_deducts_stock: bool,

    /// VAT rate applied to new products without an explicit rate
    pub default_vat_rate: Decimal,

    /// Unit label applied to new products without an explicit unit
    pub default_unit: String,
}

impl WarehouseConfig {
    pub fn stock_policy(&self) -> StockPolicy {
        StockPolicy {
            allow_negative_stock: self.allow_negative_stock,
        }
    }

    pub fn usage_policy(&self) -> UsagePolicy {
        UsagePolicy {
            planned_usage_deducts_stock: self.planned_usage_deducts_stock,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("SALON_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("log.format", "pretty")?
            .set_default("warehouse.allow_negative_stock", true)?
            .set_default("warehouse.planned_usage_deducts_stock", false)?
            .set_default("warehouse.default_vat_rate", "23")?
            .set_default("warehouse.default_unit", "op.")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SALON_ prefix)
            .add_source(
                Environment::with_prefix("SALON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn should_run_migrations(&self) -> bool {
        self.is_development() || self.database.run_migrations
    }
}
