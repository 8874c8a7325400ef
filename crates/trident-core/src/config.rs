//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;

/// Full configuration for a Trident deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TridentConfig {
    /// Burn-claim finality settings.
    #[serde(default)]
    pub finality: FinalityConfig,

    /// Settlement ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Swap orchestration settings.
    #[serde(default)]
    pub swap: SwapConfig,

    /// Transport retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Confirmation depths for the burn-claim pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalityConfig {
    /// Confirmations before a detected burn may move to pending.
    #[serde(default = "default_confirm_depth")]
    pub confirm_depth: u64,
    /// Confirmations before a pending claim is final and mintable.
    #[serde(default = "default_final_depth")]
    pub final_depth: u64,
}

/// Settlement ledger fees and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Flat fee in base units charged on Transfer, Lock and Unlock.
    /// Settlement ops (HTLC create/claim/refund) are fee-exempt.
    #[serde(default = "default_fee")]
    pub fee: u64,
    /// Account credited with collected fees. Fees stay inside the M0
    /// supply; burning them would unbalance issuance accounting.
    #[serde(default = "default_fee_collector")]
    pub fee_collector: String,
    /// Maximum fee-exempt settlement ops touching one receipt per block.
    #[serde(default = "default_settlement_ops_per_receipt")]
    pub settlement_ops_per_receipt: u32,
}

/// Swap orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Seconds a plan stays open before it expires un-funded.
    #[serde(default = "default_plan_ttl_secs")]
    pub plan_ttl_secs: u64,
    /// Milliseconds between orchestrator polls of chain state.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Retry policy for per-leg transport calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Per-attempt timeout, in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_confirm_depth() -> u64 {
    6
}
fn default_final_depth() -> u64 {
    100
}
fn default_fee() -> u64 {
    10
}
fn default_fee_collector() -> String {
    "treasury".into()
}
fn default_settlement_ops_per_receipt() -> u32 {
    1
}
fn default_plan_ttl_secs() -> u64 {
    900
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_attempt_timeout_ms() -> u64 {
    10_000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            confirm_depth: default_confirm_depth(),
            final_depth: default_final_depth(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fee: default_fee(),
            fee_collector: default_fee_collector(),
            settlement_ops_per_receipt: default_settlement_ops_per_receipt(),
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            plan_ttl_secs: default_plan_ttl_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl TridentConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: TridentConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
