use serde::Deserialize;

use crate::services::LedgerLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub ledger: LedgerSettings,
    pub gateway: GatewaySettings,
    pub application: ApplicationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

/// Per-operation caps applied by the wallet ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    pub max_recharge_amount: i64,
    pub max_deduct_amount: i64,
}

impl From<&LedgerSettings> for LedgerLimits {
    fn from(settings: &LedgerSettings) -> Self {
        LedgerLimits {
            max_recharge_amount: settings.max_recharge_amount,
            max_deduct_amount: settings.max_deduct_amount,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct GatewaySettings {
    pub api_v3_key: String,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_v3_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
