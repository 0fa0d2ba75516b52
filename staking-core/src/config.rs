//! Configuration for the staking core

use serde::{Deserialize, Serialize};

/// Thirty days, in blocks
pub const DEFAULT_UNBONDING_PERIOD: u64 = 30 * 24 * 60 * 60;

/// Staking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name, attached to the replay tool's log span
    pub service_name: String,

    /// Blocks between unbond initiation and payout
    pub unbonding_period: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "staking-core".to_string(),
            unbonding_period: DEFAULT_UNBONDING_PERIOD,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(period) = std::env::var("STAKING_UNBONDING_PERIOD") {
            config.unbonding_period = period.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid STAKING_UNBONDING_PERIOD: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check configuration invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.unbonding_period == 0 {
            return Err(crate::Error::Config(
                "unbonding_period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
