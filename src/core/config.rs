use std::fs;
use std::path::Path;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::core::errors::BridgeError;

/// External query service endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the query-fulfillment API.
    #[serde(default = "ServiceConfig::default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "ServiceConfig::default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServiceConfig {
    fn default_base_url() -> String {
        "https://api.oraclize.it/v1".to_string()
    }
    fn default_request_timeout() -> u64 {
        10
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_secs: Self::default_request_timeout(),
        }
    }
}

/// Status polling policy for outstanding queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between consecutive status checks (milliseconds).
    #[serde(default = "PollingConfig::default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum number of status checks before a query is failed.
    #[serde(default = "PollingConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl PollingConfig {
    fn default_interval_ms() -> u64 {
        5_000
    }
    fn default_max_attempts() -> u32 {
        120
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

/// Retry policy for the query-create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRetryConfig {
    /// Attempt budget; exhaustion fails the query.
    #[serde(default = "CreateRetryConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff (milliseconds); doubles after every failed attempt.
    #[serde(default = "CreateRetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl CreateRetryConfig {
    fn default_max_attempts() -> u32 {
        3
    }
    fn default_backoff_ms() -> u64 {
        500
    }
}

impl Default for CreateRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub create_retry: CreateRetryConfig,

    /// Account the bridge operates: sender of callback and wiring
    /// transactions.
    #[serde(default = "BridgeConfig::default_operator_account")]
    pub operator_account: String,

    /// Gas allowance for deployment and wiring transactions.
    #[serde(default = "BridgeConfig::default_deploy_gas")]
    pub deploy_gas: u64,
}

impl BridgeConfig {
    fn default_operator_account() -> String {
        "0x265a5c3dd46ec82e2744f1d0e9fb4ed75d56132a".to_string()
    }
    fn default_deploy_gas() -> u64 {
        3_000_000
    }

    /// Load a configuration from a TOML file. Missing fields fall back
    /// to their defaults.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// The operator account as a ledger address.
    pub fn operator(&self) -> Result<Address, BridgeError> {
        self.operator_account.parse().map_err(|e| {
            BridgeError::Config(format!("invalid operator account '{}': {}", self.operator_account, e))
        })
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            polling: PollingConfig::default(),
            create_retry: CreateRetryConfig::default(),
            operator_account: Self::default_operator_account(),
            deploy_gas: Self::default_deploy_gas(),
        }
    }
}
