//! Configuration management for the circulation daemon

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CirculationConfig {
    /// Days a validated request waits at the desk before expiring
    #[validate(range(min = 1, max = 365))]
    pub request_expiration_days: u32,
    /// Seconds between two expired-request sweeps
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
    /// User recorded as transaction user of automatic cancellations
    pub system_user_id: i32,
    /// Snowflake instance id, unique per running process
    #[validate(range(max = 1023))]
    pub instance_id: u16,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LoggingConfig {
    #[validate(length(min = 1))]
    pub level: String,
    /// `pretty` or `json`
    #[validate(length(min = 1))]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup and written back at shutdown
    #[validate(length(min = 1))]
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone, Default, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub circulation: CirculationConfig,
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (e.g. CIRCULATION_CIRCULATION__INSTANCE_ID)
            .add_source(
                Environment::with_prefix("CIRCULATION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Override snapshot path from SNAPSHOT_PATH env var if present
            .set_override_option("store.snapshot_path", env::var("SNAPSHOT_PATH").ok())?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            request_expiration_days: 10,
            sweep_interval_secs: 3600,
            system_user_id: 0,
            instance_id: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "data/circulation.json".to_string(),
        }
    }
}
