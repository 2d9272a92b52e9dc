//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field carries a serde default so a partial file works.

pub mod allocation;
pub mod bootstrap;
pub mod cache;
pub mod database;
pub mod delivery;
pub mod logging;
pub mod scheduler;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::allocation::AllocationConfig;
pub use self::bootstrap::BootstrapConfig;
pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::delivery::DeliveryConfig;
pub use self::logging::LoggingConfig;
pub use self::scheduler::SchedulerConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay + `PARKHUB__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entity store and job store backend.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Read cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Spot allocation limits.
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Periodic sweep settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Outbound notification settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// First-start admin account.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with `config/{env}.toml` and environment
    /// variables prefixed with `PARKHUB__` (e.g. `PARKHUB__WORKER__CONCURRENCY`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PARKHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
