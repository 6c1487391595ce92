//! Configuration for the exchange

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Embedded ledger configuration
    pub ledger: datamarket_ledger::Config,

    /// Party to account mapping
    pub identity: IdentityConfig,

    /// Contract lifecycle behavior
    pub lifecycle: LifecycleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "datamarket-exchange".to_string(),
            ledger: datamarket_ledger::Config::default(),
            identity: IdentityConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

/// Identity resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix joined to a party ID to form its ledger account ID
    pub account_prefix: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            account_prefix: "account".to_string(),
        }
    }
}

/// What `mark_shipped` does when releasing the payment fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentPolicy {
    /// Put the contract back to PROPOSAL
    #[default]
    RevertOnFailure,
    /// Leave the contract SHIPPED with the payment still escrowed
    KeepShipped,
}

impl ShipmentPolicy {
    /// Parse a policy name
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "revert_on_failure" | "revert" => Some(ShipmentPolicy::RevertOnFailure),
            "keep_shipped" | "keep" => Some(ShipmentPolicy::KeepShipped),
            _ => None,
        }
    }
}

/// Lifecycle configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Behavior on payment release failure
    pub shipment_policy: ShipmentPolicy,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables (ledger variables included)
    pub fn apply_env(&mut self) -> Result<()> {
        self.ledger.apply_env()?;

        if let Ok(prefix) = std::env::var("EXCHANGE_ACCOUNT_PREFIX") {
            self.identity.account_prefix = prefix;
        }

        if let Ok(policy) = std::env::var("EXCHANGE_SHIPMENT_POLICY") {
            self.lifecycle.shipment_policy = ShipmentPolicy::from_str(&policy)
                .ok_or_else(|| Error::Config(format!("Unknown shipment policy: {}", policy)))?;
        }

        Ok(())
    }
}
