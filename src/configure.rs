use std::sync::{Arc, RwLock};

use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Global fee defaults. Per-account overrides fall back to these
/// field by field. Monetary values are declared as strings in the
/// config file so they deserialize into exact decimals.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeSettings {
    /// Snapshot version, bumped by SettingsCache on refresh.
    #[serde(default)]
    pub version: u64,

    pub deposit_fee_percent: Decimal,
    pub deposit_fee_fixed: Decimal,
    pub flexible_pricing_enabled: bool,
    pub flexible_min_threshold: Decimal,
    pub flexible_low_tier_fee: Decimal,
    pub flexible_high_tier_percent: Decimal,
    pub withdrawal_fee: Decimal,
    /// Per-transaction processor cost on payouts.
    pub acquirer_cost: Decimal,
    /// Fixed per-transaction affiliate carve-out (taken out of the fee,
    /// never added on top).
    pub affiliate_rate: Decimal,
    /// Default manager commission when the account has a manager but no
    /// per-account percentage.
    pub manager_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub data_dir: String,
    pub log_file: String,
    pub log_level: String,
    pub log_to_file: bool,
    pub fees: FeeSettings,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("data_dir", "data/pixledger")?
        .set_default("log_file", "log/pixledger.log")?
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("fees.deposit_fee_percent", "4.00")?
        .set_default("fees.deposit_fee_fixed", "0.00")?
        .set_default("fees.flexible_pricing_enabled", false)?
        .set_default("fees.flexible_min_threshold", "15.00")?
        .set_default("fees.flexible_low_tier_fee", "1.00")?
        .set_default("fees.flexible_high_tier_percent", "4.00")?
        .set_default("fees.withdrawal_fee", "1.00")?
        .set_default("fees.acquirer_cost", "0.02")?
        .set_default("fees.affiliate_rate", "0.50")?
        .set_default("fees.manager_percent", "10.00")?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    s.try_deserialize()
}

/// Holds the current fee settings snapshot. Engines receive the snapshot
/// as an argument; nothing reads this cache mid-computation. The
/// admin-configuration collaborator busts it with `refresh`.
pub struct SettingsCache {
    inner: RwLock<Arc<FeeSettings>>,
}

impl SettingsCache {
    pub fn new(mut settings: FeeSettings) -> Self {
        if settings.version == 0 {
            settings.version = 1;
        }
        Self { inner: RwLock::new(Arc::new(settings)) }
    }

    /// Current snapshot. Cheap clone of an Arc.
    pub fn current(&self) -> Arc<FeeSettings> {
        self.inner.read().expect("settings lock poisoned").clone()
    }

    /// Replace the snapshot, bumping the version. Returns the new version.
    pub fn refresh(&self, mut settings: FeeSettings) -> u64 {
        let mut guard = self.inner.write().expect("settings lock poisoned");
        settings.version = guard.version + 1;
        let version = settings.version;
        *guard = Arc::new(settings);
        version
    }
}
