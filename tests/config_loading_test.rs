//! Integration test for configuration loading from disk

#[cfg(test)]
mod config_loading_tests {
    use score_relayer::config::{Config, ConfigError, StoreBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[[chains]]
chain_id = 10143
name = "monad-testnet"
rpc_url = "https://testnet-rpc.monad.xyz"
score_manager = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
leaderboard = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"

[[chains]]
chain_id = 31337
name = "anvil"
rpc_url = "http://127.0.0.1:8545"
score_manager = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"

[store]
backend = "memory"

[queue]
tx_concurrency = 50
backoff_ms = 500

[worker]
pacing_delay_ms = 0
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(SAMPLE);
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.queue.tx_concurrency, 50);
        assert_eq!(config.queue.backoff_ms, 500);
        // Unset fields keep their defaults
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.score_concurrency, 1);
        assert_eq!(config.nonce.slot_ttl_ms, 10_000);
        assert_eq!(config.gas.cache_ttl_secs, 120);
        assert_eq!(config.worker.pacing_delay_ms, 0);

        let monad = config.chain(10143).unwrap();
        assert!(monad.leaderboard.is_some());
        assert!(config.chain(31337).unwrap().leaderboard.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("relayer.toml");
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.gas.fixed_fee_chain_id, Some(10143));
        assert_eq!(config.gas.base_fee_multiplier_percent, 120);
        assert_eq!(config.monitoring.metrics_port, 9090);
    }

    #[test]
    fn test_gas_section_with_every_key() {
        let with_gas = format!(
            "{}\n[gas]\ncache_ttl_secs = 30\nfixed_fee_chain_id = 31337\n\
             fixed_max_priority_fee_per_gas = 3000000000\nfixed_max_fee_per_gas = 60000000000\n\
             base_fee_multiplier_percent = 150\n",
            SAMPLE
        );
        let file = write_config(&with_gas);
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.gas.cache_ttl_secs, 30);
        assert_eq!(config.gas.fixed_fee_chain_id, Some(31337));
        assert_eq!(config.gas.fixed_max_priority_fee_per_gas, 3_000_000_000);
        assert_eq!(config.gas.fixed_max_fee_per_gas, 60_000_000_000);
        assert_eq!(config.gas.base_fee_multiplier_percent, 150);
    }

    #[test]
    fn test_env_overrides_applied_after_file() {
        let file = write_config(SAMPLE);
        let mut config = Config::from_file(file.path()).unwrap();

        config.apply_env(|name| match name {
            "RELAYER_PRIVATE_KEYS" => Some(
                " 0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80 , ,\
                 0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
                    .to_string(),
            ),
            "REDIS_HOST" => Some("redis.internal".to_string()),
            "REDIS_PORT" => Some("6380".to_string()),
            "CHAIN_10143_BACKEND_RPC_URL" => Some("https://backend.example/rpc".to_string()),
            _ => None,
        });

        assert_eq!(config.secrets.relayer_private_keys.len(), 2);
        assert_eq!(config.store.redis_url, "redis://redis.internal:6380");
        assert_eq!(
            config.chain(10143).unwrap().effective_rpc_url(),
            "https://backend.example/rpc"
        );
        assert_eq!(config.chain(31337).unwrap().effective_rpc_url(), "http://127.0.0.1:8545");
        assert!(config.validate().is_ok());

        // Secrets never reach Debug output
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"));
    }

    #[test]
    fn test_invalid_private_key_rejected_by_index() {
        let file = write_config(SAMPLE);
        let mut config = Config::from_file(file.path()).unwrap();
        config.apply_env(|name| {
            (name == "RELAYER_PRIVATE_KEYS").then(|| {
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80,not-a-key".to_string()
            })
        });

        match config.validate() {
            Err(ConfigError::InvalidPrivateKey { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected invalid key error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        match Config::from_file(&path) {
            Err(ConfigError::Io { path: reported, .. }) => {
                assert!(reported.ends_with("missing.toml"))
            }
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_chain_rejected() {
        let doubled = format!(
            "{}\n[[chains]]\nchain_id = 31337\nname = \"again\"\nrpc_url = \"http://x\"\nscore_manager = \"0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0\"\n",
            SAMPLE
        );
        let file = write_config(&doubled);
        let config = Config::from_file(file.path()).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
