//! Runner configuration

use serde::Deserialize;

use core_kernel::Timezone;
use infra_db::DatabaseConfig;

/// Runner configuration, read from `BILLING_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit JSON log lines instead of text
    pub log_json: bool,
    /// The yard's local timezone, e.g. `Europe/London`
    pub timezone: Timezone,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/livery".to_string(),
            max_connections: 5,
            log_level: "info".to_string(),
            log_json: false,
            timezone: Timezone::default(),
        }
    }
}

impl RunnerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("BILLING"))
    }

    /// Loads configuration from an environment source over the defaults
    pub fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("timezone", "Europe/London")?
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Pool settings for `infra_db::create_pool`
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone()).max_connections(self.max_connections)
    }
}
