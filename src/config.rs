//! Configuration module for the relayer workers
//!
//! This module handles configuration loading from a TOML file plus
//! environment variables (secrets and per-deployment endpoints never live in
//! the file), and provides the structured configuration types.

use crate::types::ChainId;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

pub const ENV_RELAYER_PRIVATE_KEYS: &str = "RELAYER_PRIVATE_KEYS";
pub const ENV_SCORE_PUBLISHER_PRIVATE_KEY: &str = "SCORE_PUBLISHER_PRIVATE_KEY";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_REDIS_HOST: &str = "REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "REDIS_PORT";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const GWEI: u64 = 1_000_000_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The key itself is never included
    #[error("Invalid private key #{index} in {variable}")]
    InvalidPrivateKey { variable: &'static str, index: usize },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chains the workers submit to
    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    /// Coordination store
    #[serde(default)]
    pub store: StoreConfig,

    /// Queue lanes and retry policy
    #[serde(default)]
    pub queue: QueueConfig,

    /// Nonce coordinator timings
    #[serde(default)]
    pub nonce: NonceConfig,

    /// Fee cache
    #[serde(default)]
    pub gas: GasConfig,

    /// Submission workers
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Secrets, read from the environment only
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,

    /// Human readable name, for logs
    pub name: String,

    /// Public RPC endpoint
    pub rpc_url: String,

    /// ScoreManager contract
    pub score_manager: Address,

    /// Leaderboard contract, required on chains receiving score pushes
    #[serde(default)]
    pub leaderboard: Option<Address>,

    /// Backend-only RPC endpoint from `CHAIN_<ID>_BACKEND_RPC_URL`
    #[serde(skip)]
    pub backend_rpc_url: Option<String>,
}

impl ChainConfig {
    /// Endpoint used by both read and write clients
    pub fn effective_rpc_url(&self) -> &str {
        self.backend_rpc_url.as_deref().unwrap_or(&self.rpc_url)
    }

    /// Environment variable holding the backend RPC override for this chain
    pub fn backend_rpc_env_var(&self) -> String {
        format!("CHAIN_{}_BACKEND_RPC_URL", self.chain_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts per job, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay before a failed job is retried
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Idle poll interval when a lane is empty
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between stalled-job sweeps
    #[serde(default = "default_stalled_check_interval_ms")]
    pub stalled_check_interval_ms: u64,

    /// Lease held by a worker while it runs a job
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    /// In-flight jobs on the transaction-processing lane
    #[serde(default = "default_tx_concurrency")]
    pub tx_concurrency: usize,

    /// In-flight jobs on the send-user-score lane
    #[serde(default = "default_score_concurrency")]
    pub score_concurrency: usize,
}

impl QueueConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stalled_check_interval(&self) -> Duration {
        Duration::from_millis(self.stalled_check_interval_ms)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// Expiry of the per-(chain, address) lock
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,

    /// Expiry of the cached next nonce
    #[serde(default = "default_slot_ttl_ms")]
    pub slot_ttl_ms: u64,

    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,

    #[serde(default = "default_lock_max_attempts")]
    pub lock_max_attempts: u32,
}

impl NonceConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn slot_ttl(&self) -> Duration {
        Duration::from_millis(self.slot_ttl_ms)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Lifetime of a cached fee pair
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Chain served with constant fees instead of estimates
    #[serde(default = "default_fixed_fee_chain_id")]
    pub fixed_fee_chain_id: Option<ChainId>,

    #[serde(default = "default_fixed_max_priority_fee_per_gas")]
    pub fixed_max_priority_fee_per_gas: u64,

    #[serde(default = "default_fixed_max_fee_per_gas")]
    pub fixed_max_fee_per_gas: u64,

    /// Headroom over the next block's base fee, in percent
    #[serde(default = "default_base_fee_multiplier_percent")]
    pub base_fee_multiplier_percent: u64,
}

impl GasConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Throttle between nonce acquisition and fee resolution
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
}

impl WorkerConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

/// Secret material loaded from the environment
#[derive(Clone, Default)]
pub struct Secrets {
    pub relayer_private_keys: Vec<Zeroizing<String>>,
    pub score_publisher_private_key: Option<Zeroizing<String>>,
    pub database_url: Option<Zeroizing<String>>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("relayer_private_keys", &self.relayer_private_keys.len())
            .field(
                "score_publisher_private_key",
                &self.score_publisher_private_key.is_some(),
            )
            .field("database_url", &self.database_url.is_some())
            .finish()
    }
}

// Default value functions
fn default_store_backend() -> StoreBackend { StoreBackend::Redis }
fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_ms() -> u64 { 2_000 }
fn default_poll_interval_ms() -> u64 { 50 }
fn default_stalled_check_interval_ms() -> u64 { 15_000 }
fn default_lease_ttl_ms() -> u64 { 60_000 }
fn default_tx_concurrency() -> usize { 100 }
fn default_score_concurrency() -> usize { 1 }
fn default_lock_ttl_ms() -> u64 { 5_000 }
fn default_slot_ttl_ms() -> u64 { 10_000 }
fn default_lock_poll_interval_ms() -> u64 { 20 }
fn default_lock_max_attempts() -> u32 { 250 }
fn default_cache_ttl_secs() -> u64 { 120 }
fn default_fixed_fee_chain_id() -> Option<ChainId> { Some(10143) }
fn default_fixed_max_priority_fee_per_gas() -> u64 { 2 * GWEI }
fn default_fixed_max_fee_per_gas() -> u64 { 60 * GWEI }
fn default_base_fee_multiplier_percent() -> u64 { 120 }
fn default_pacing_delay_ms() -> u64 { 3_000 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            stalled_check_interval_ms: default_stalled_check_interval_ms(),
            lease_ttl_ms: default_lease_ttl_ms(),
            tx_concurrency: default_tx_concurrency(),
            score_concurrency: default_score_concurrency(),
        }
    }
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            lock_ttl_ms: default_lock_ttl_ms(),
            slot_ttl_ms: default_slot_ttl_ms(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            lock_max_attempts: default_lock_max_attempts(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            fixed_fee_chain_id: default_fixed_fee_chain_id(),
            fixed_max_priority_fee_per_gas: default_fixed_max_priority_fee_per_gas(),
            fixed_max_fee_per_gas: default_fixed_max_fee_per_gas(),
            base_fee_multiplier_percent: default_base_fee_multiplier_percent(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: default_pacing_delay_ms(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
            json_logs: false,
        }
    }
}

impl Default for Config {
    /// Local anvil chain only
    fn default() -> Self {
        Self {
            chains: vec![ChainConfig {
                chain_id: 31337,
                name: "anvil".to_string(),
                rpc_url: "http://127.0.0.1:8545".to_string(),
                score_manager: Address::repeat_byte(0x01),
                leaderboard: None,
                backend_rpc_url: None,
            }],
            store: StoreConfig::default(),
            queue: QueueConfig::default(),
            nonce: NonceConfig::default(),
            gas: GasConfig::default(),
            worker: WorkerConfig::default(),
            monitoring: MonitoringConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_RELAYER_PRIVATE_KEYS) {
            self.secrets.relayer_private_keys = parse_key_list(&raw);
        }

        if let Some(raw) = lookup(ENV_SCORE_PUBLISHER_PRIVATE_KEY) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.secrets.score_publisher_private_key = Some(Zeroizing::new(trimmed.to_string()));
            }
        }

        if let Some(url) = lookup(ENV_REDIS_URL).filter(|u| !u.trim().is_empty()) {
            self.store.redis_url = url.trim().to_string();
        } else if let Some(host) = lookup(ENV_REDIS_HOST).filter(|h| !h.trim().is_empty()) {
            let port = lookup(ENV_REDIS_PORT).unwrap_or_else(|| "6379".to_string());
            self.store.redis_url = format!("redis://{}:{}", host.trim(), port.trim());
        }

        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|u| !u.trim().is_empty()) {
            self.secrets.database_url = Some(Zeroizing::new(url.trim().to_string()));
        }

        for chain in &mut self.chains {
            if let Some(url) = lookup(&chain.backend_rpc_env_var()).filter(|u| !u.trim().is_empty()) {
                chain.backend_rpc_url = Some(url.trim().to_string());
            }
        }
    }

    /// Validate configuration before any connection is opened
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chains.is_empty() {
            return Err(ConfigError::Invalid("at least one [[chains]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate chain_id {}",
                    chain.chain_id
                )));
            }
            if chain.score_manager.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "chain {} has a zero score_manager address",
                    chain.chain_id
                )));
            }
            if chain.leaderboard.map_or(false, |a| a.is_zero()) {
                return Err(ConfigError::Invalid(format!(
                    "chain {} has a zero leaderboard address",
                    chain.chain_id
                )));
            }
        }

        if self.queue.tx_concurrency == 0 || self.queue.score_concurrency == 0 {
            return Err(ConfigError::Invalid("worker concurrency must be at least 1".into()));
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Invalid("queue.max_attempts must be at least 1".into()));
        }
        if self.nonce.lock_max_attempts == 0 {
            return Err(ConfigError::Invalid("nonce.lock_max_attempts must be at least 1".into()));
        }

        for (index, key) in self.secrets.relayer_private_keys.iter().enumerate() {
            if PrivateKeySigner::from_str(key).is_err() {
                return Err(ConfigError::InvalidPrivateKey {
                    variable: ENV_RELAYER_PRIVATE_KEYS,
                    index,
                });
            }
        }
        if let Some(key) = &self.secrets.score_publisher_private_key {
            if PrivateKeySigner::from_str(key).is_err() {
                return Err(ConfigError::InvalidPrivateKey {
                    variable: ENV_SCORE_PUBLISHER_PRIVATE_KEY,
                    index: 0,
                });
            }
        }

        Ok(())
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

/// Split a comma separated key list, dropping blanks
fn parse_key_list(raw: &str) -> Vec<Zeroizing<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| Zeroizing::new(k.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_relay_policy() {
        let config = Config::default();
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.backoff(), Duration::from_secs(2));
        assert_eq!(config.queue.tx_concurrency, 100);
        assert_eq!(config.queue.score_concurrency, 1);
        assert_eq!(config.nonce.lock_ttl(), Duration::from_secs(5));
        assert_eq!(config.nonce.slot_ttl(), Duration::from_secs(10));
        assert_eq!(config.nonce.lock_max_attempts, 250);
        assert_eq!(config.gas.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.worker.pacing_delay(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (ENV_RELAYER_PRIVATE_KEYS, &format!(" {KEY_A} ,, {KEY_B},")),
            (ENV_SCORE_PUBLISHER_PRIVATE_KEY, KEY_B),
            (ENV_REDIS_HOST, "cache.internal"),
            (ENV_REDIS_PORT, "6380"),
            ("CHAIN_31337_BACKEND_RPC_URL", "http://backend:8545"),
        ]));

        assert_eq!(config.secrets.relayer_private_keys.len(), 2);
        assert_eq!(config.secrets.relayer_private_keys[0].as_str(), KEY_A);
        assert!(config.secrets.score_publisher_private_key.is_some());
        assert_eq!(config.store.redis_url, "redis://cache.internal:6380");
        assert_eq!(config.chains[0].effective_rpc_url(), "http://backend:8545");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_url_wins_over_host() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (ENV_REDIS_URL, "redis://primary:6379/2"),
            (ENV_REDIS_HOST, "ignored"),
        ]));
        assert_eq!(config.store.redis_url, "redis://primary:6379/2");
    }

    #[test]
    fn test_validate_rejects_bad_key_without_leaking_it() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_RELAYER_PRIVATE_KEYS, "0xdeadbeef-secret")]));

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("RELAYER_PRIVATE_KEYS"));
        assert!(!message.contains("deadbeef"));
    }

    #[test]
    fn test_validate_rejects_duplicate_chain_and_zero_concurrency() {
        let mut config = Config::default();
        config.chains.push(config.chains[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.queue.tx_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.chains.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_relayer_list_is_valid() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_RELAYER_PRIVATE_KEYS, "")]));
        assert!(config.secrets.relayer_private_keys.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_debug_redacts_keys() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_RELAYER_PRIVATE_KEYS, KEY_A)]));
        let debug = format!("{:?}", config);
        assert!(!debug.contains(&KEY_A[2..]));
    }
}
