//! Configuration management with validation and defaults
//!
//! `NodeConfig` is loaded from TOML, overridden from `RAFFLE_*` environment
//! variables and validated before anything is constructed from it.

use crate::errors::{AppResult, ConfigurationError};
use crate::types::{parse_amount, Address, Amount, KeyHash};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// 0.01 ether in wei
pub const DEFAULT_ENTRANCE_FEE: Amount = 10_000_000_000_000_000;
pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_KEY_HASH: &str =
    "0x787d74caea10b2b357790d5b5247c2f63d1d91572a9846f780606e4d953677ae";
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
pub const DEFAULT_REQUEST_CONFIRMATIONS: u16 = 3;

pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;
pub const MAX_NUM_WORDS: u32 = 500;

/// Address the local coordinator answers from
pub const LOCAL_COORDINATOR: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
/// Consumer identity of the local raffle
pub const LOCAL_RAFFLE: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";

fn local_address(s: &str) -> Address {
    s.parse().unwrap_or_default()
}

/// Oracle parameters fixed at construction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSettings {
    /// The only caller allowed to deliver fulfillments
    pub coordinator: Address,
    pub key_hash: KeyHash,
    pub subscription_id: String,
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
    pub num_words: u32,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            coordinator: local_address(LOCAL_COORDINATOR),
            key_hash: DEFAULT_KEY_HASH.parse().unwrap_or_default(),
            subscription_id: "1".to_string(),
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            request_confirmations: DEFAULT_REQUEST_CONFIRMATIONS,
            num_words: 1,
        }
    }
}

/// Immutable raffle configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleConfig {
    /// The raffle's own consumer identity
    pub address: Address,
    #[serde(with = "crate::types::amount_serde")]
    pub entrance_fee: Amount,
    pub interval_secs: u64,
    pub oracle: OracleSettings,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            address: local_address(LOCAL_RAFFLE),
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            interval_secs: DEFAULT_INTERVAL_SECS,
            oracle: OracleSettings::default(),
        }
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl RaffleConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.entrance_fee == 0 {
            return Err(invalid("raffle.entrance_fee", 0, "Entrance fee cannot be zero"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("raffle.interval_secs", 0, "Interval cannot be zero"));
        }

        let oracle = &self.oracle;
        if oracle.callback_gas_limit == 0 {
            return Err(invalid(
                "raffle.oracle.callback_gas_limit",
                0,
                "Callback gas limit cannot be zero",
            ));
        }
        if oracle.request_confirmations == 0
            || oracle.request_confirmations > MAX_REQUEST_CONFIRMATIONS
        {
            return Err(invalid(
                "raffle.oracle.request_confirmations",
                oracle.request_confirmations,
                "Confirmations must be between 1 and 200",
            ));
        }
        if oracle.num_words == 0 || oracle.num_words > MAX_NUM_WORDS {
            return Err(invalid(
                "raffle.oracle.num_words",
                oracle.num_words,
                "Word count must be between 1 and 500",
            ));
        }
        if oracle.subscription_id.is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "raffle.oracle.subscription_id".to_string(),
            ));
        }
        if !oracle.subscription_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(
                "raffle.oracle.subscription_id",
                &oracle.subscription_id,
                "Subscription id must be decimal digits",
            ));
        }
        Ok(())
    }
}

/// HTTP API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Automation caller settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeeperConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1_000,
        }
    }
}

/// Local coordinator settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MockOracleConfig {
    #[serde(with = "crate::types::amount_serde")]
    pub base_fee: Amount,
    #[serde(with = "crate::types::amount_serde")]
    pub gas_price: Amount,
    /// Amount credited to the subscription at startup
    #[serde(with = "crate::types::amount_serde")]
    pub fund_amount: Amount,
    /// How often the relay advances one block and delivers ready requests
    pub block_time_ms: u64,
}

impl Default for MockOracleConfig {
    fn default() -> Self {
        Self {
            base_fee: 100_000_000_000_000_000,
            gas_price: 1_000_000_000,
            fund_amount: 100_000_000_000_000_000_000,
            block_time_ms: 1_000,
        }
    }
}

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    pub raffle: RaffleConfig,
    pub api: ApiSettings,
    pub keeper: KeeperConfig,
    pub mock_oracle: MockOracleConfig,
}

impl NodeConfig {
    /// Fast settings for local experiments and tests
    pub fn fast_local() -> Self {
        Self {
            raffle: RaffleConfig {
                interval_secs: 1,
                oracle: OracleSettings {
                    request_confirmations: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
            keeper: KeeperConfig {
                enabled: true,
                poll_interval_ms: 100,
            },
            mock_oracle: MockOracleConfig {
                block_time_ms: 100,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load from file (or defaults), apply environment overrides, validate
    pub fn load(&self) -> AppResult<NodeConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => NodeConfig::default(),
        };

        apply_overrides(&mut config, |key| env::var(key).ok())?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> AppResult<NodeConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn validate(&self, config: &NodeConfig) -> AppResult<()> {
        config.raffle.validate()?;

        if config.api.port == 0 {
            return Err(invalid("api.port", 0, "Port cannot be zero").into());
        }
        if config.keeper.poll_interval_ms == 0 {
            return Err(invalid("keeper.poll_interval_ms", 0, "Poll interval cannot be zero").into());
        }
        if config.mock_oracle.block_time_ms == 0 {
            return Err(invalid("mock_oracle.block_time_ms", 0, "Block time cannot be zero").into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &NodeConfig, path: &str) -> AppResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

/// Apply `RAFFLE_*` overrides read through `lookup`
fn apply_overrides<F>(config: &mut NodeConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(fee) = lookup("RAFFLE_ENTRANCE_FEE") {
        config.raffle.entrance_fee =
            parse_amount(&fee).ok_or_else(|| invalid("RAFFLE_ENTRANCE_FEE", &fee, "Invalid amount"))?;
    }
    if let Some(interval) = lookup("RAFFLE_INTERVAL_SECS") {
        config.raffle.interval_secs = interval
            .parse()
            .map_err(|_| invalid("RAFFLE_INTERVAL_SECS", &interval, "Invalid number of seconds"))?;
    }
    if let Some(host) = lookup("RAFFLE_API_HOST") {
        config.api.host = host;
    }
    if let Some(port) = lookup("RAFFLE_API_PORT") {
        config.api.port = port
            .parse()
            .map_err(|_| invalid("RAFFLE_API_PORT", &port, "Invalid port number"))?;
    }
    if let Some(enabled) = lookup("RAFFLE_KEEPER_ENABLED") {
        config.keeper.enabled = enabled
            .parse()
            .map_err(|_| invalid("RAFFLE_KEEPER_ENABLED", &enabled, "Invalid boolean value"))?;
    }
    Ok(())
}

/// Write the default configuration as a starting point
pub fn generate_sample_config(path: &str) -> AppResult<()> {
    ConfigLoader::new().save(&NodeConfig::default(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.raffle.entrance_fee, DEFAULT_ENTRANCE_FEE);
        assert_eq!(config.raffle.interval_secs, 10);
        assert_eq!(config.raffle.oracle.num_words, 1);
        assert_eq!(config.raffle.oracle.coordinator.to_string(), LOCAL_COORDINATOR);
        assert!(config.raffle.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let loader = ConfigLoader::new();
        let mut config = NodeConfig::default();
        assert!(loader.validate(&config).is_ok());

        config.raffle.entrance_fee = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = NodeConfig::default();
        config.raffle.oracle.request_confirmations = 0;
        assert!(loader.validate(&config).is_err());

        let mut config = NodeConfig::default();
        config.raffle.oracle.subscription_id = "12ab".to_string();
        assert!(loader.validate(&config).is_err());

        let mut config = NodeConfig::default();
        config.api.port = 0;
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RAFFLE_ENTRANCE_FEE", "1_000"),
            ("RAFFLE_INTERVAL_SECS", "30"),
            ("RAFFLE_API_PORT", "9000"),
            ("RAFFLE_KEEPER_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = NodeConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.raffle.entrance_fee, 1_000);
        assert_eq!(config.raffle.interval_secs, 30);
        assert_eq!(config.api.port, 9000);
        assert!(!config.keeper.enabled);
    }

    #[test]
    fn test_bad_env_override() {
        let mut config = NodeConfig::default();
        let err = apply_overrides(&mut config, |k| {
            (k == "RAFFLE_API_PORT").then(|| "eighty".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_load_config() -> AppResult<()> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_str().unwrap().to_string();

        let mut original = NodeConfig::default();
        original.raffle.entrance_fee = 123_456_789_000_000_000_000;
        ConfigLoader::new().save(&original, &path)?;

        let loaded = ConfigLoader::new().with_path(&path).load_from_file(&path)?;
        assert_eq!(loaded.raffle, original.raffle);
        assert_eq!(loaded.api.port, original.api.port);
        Ok(())
    }
}
