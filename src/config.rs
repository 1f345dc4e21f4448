//! Configuration management
//!
//! Engine knobs live in [`LedgerConfig`]; the node binary wraps them in
//! [`NodeConfig`] together with its data directory and RPC port. Every
//! field has a default, so an absent or partial TOML file is fine.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{
    CHAIN_STORAGE_KEY, MINING_SLICE_MS, MINING_TRIGGER_THRESHOLD, TARGET_BLOCK_TIME_MS,
    TEST_MODE_MAX_ITERATIONS, WALLETS_STORAGE_KEY,
};
use crate::mining::{ConsensusMode, MiningMode};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

/// Ledger engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mining_mode: MiningMode,
    pub consensus_mode: ConsensusMode,
    /// Pending transactions that trigger automatic mining
    pub mining_trigger_threshold: usize,
    /// Wall-clock budget of one normal-mode search slice
    pub mining_slice_ms: u64,
    pub test_mode_max_iterations: u64,
    pub target_block_time_ms: u64,
    /// Spawn a mining task when the trigger threshold is reached
    pub auto_mine: bool,
    pub chain_key: String,
    pub wallets_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mining_mode: MiningMode::default(),
            consensus_mode: ConsensusMode::default(),
            mining_trigger_threshold: MINING_TRIGGER_THRESHOLD,
            mining_slice_ms: MINING_SLICE_MS,
            test_mode_max_iterations: TEST_MODE_MAX_ITERATIONS,
            target_block_time_ms: TARGET_BLOCK_TIME_MS,
            auto_mine: true,
            chain_key: CHAIN_STORAGE_KEY.to_string(),
            wallets_key: WALLETS_STORAGE_KEY.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn mining_slice(&self) -> Duration {
        Duration::from_millis(self.mining_slice_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_key.is_empty() || self.wallets_key.is_empty() {
            return Err(ConfigError::Invalid("storage keys must not be empty"));
        }
        if self.chain_key == self.wallets_key {
            return Err(ConfigError::Invalid("chain_key and wallets_key must differ"));
        }
        if self.mining_trigger_threshold == 0 {
            return Err(ConfigError::Invalid("mining_trigger_threshold must be at least 1"));
        }
        if self.mining_slice_ms == 0 {
            return Err(ConfigError::Invalid("mining_slice_ms must be positive"));
        }
        if self.target_block_time_ms == 0 {
            return Err(ConfigError::Invalid("target_block_time_ms must be positive"));
        }
        Ok(())
    }
}

/// Node binary configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: String,
    pub rpc_port: u16,
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./ledger_data".to_string(),
            rpc_port: 8545,
            ledger: LedgerConfig::default(),
        }
    }
}

/// Load configuration from a TOML file
///
/// A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
    let config = match fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)?,
        Err(e) if e.kind() == ErrorKind::NotFound => NodeConfig::default(),
        Err(e) => return Err(e.into()),
    };

    if config.data_dir.is_empty() {
        return Err(ConfigError::Invalid("data_dir must be set"));
    }
    config.ledger.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.ledger.mining_mode, MiningMode::Test);
        assert_eq!(config.ledger.mining_trigger_threshold, 3);
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "rpc_port = 9000\n\n[ledger]\nmining_mode = \"instant\"\nauto_mine = false"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rpc_port, 9000);
        assert_eq!(config.ledger.mining_mode, MiningMode::Instant);
        assert!(!config.ledger.auto_mine);
        assert_eq!(config.ledger.chain_key, CHAIN_STORAGE_KEY);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nmining_trigger_threshold = 0").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Invalid(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpc_port = \"not a port\"").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
