//! TTL-cached EIP-1559 fee pairs per chain
//!
//! Cached entries hold both fees as decimal strings, since wei amounts do not
//! survive a round trip through JSON numbers. A cold or expired entry is
//! resolved inline against the chain; callers never see a placeholder.

use super::{GasError, GasResult};
use crate::chain::ChainRegistry;
use crate::config::GasConfig;
use crate::metrics::metrics;
use crate::store::CoordinationStore;
use crate::types::{unix_millis, ChainId, FeePair};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub fn fee_cache_key(chain_id: ChainId) -> String {
    format!("gas_fees:{}", chain_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeCacheEntry {
    max_priority_fee_per_gas: String,
    max_fee_per_gas: String,
    fetched_at: u64,
}

impl FeeCacheEntry {
    fn new(fees: FeePair) -> Self {
        Self {
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas.to_string(),
            max_fee_per_gas: fees.max_fee_per_gas.to_string(),
            fetched_at: unix_millis(),
        }
    }

    fn fees(&self) -> Option<FeePair> {
        Some(FeePair {
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.parse().ok()?,
            max_fee_per_gas: self.max_fee_per_gas.parse().ok()?,
        })
    }
}

/// Gas fee cache shared by all workers
#[derive(Debug, Clone)]
pub struct GasFeeCache {
    store: Arc<dyn CoordinationStore>,
    chains: Arc<ChainRegistry>,
    ttl: Duration,
    fixed: Option<(ChainId, FeePair)>,
}

impl GasFeeCache {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        chains: Arc<ChainRegistry>,
        config: &GasConfig,
    ) -> Self {
        let fixed = config.fixed_fee_chain_id.map(|chain_id| {
            (
                chain_id,
                FeePair {
                    max_priority_fee_per_gas: u128::from(config.fixed_max_priority_fee_per_gas),
                    max_fee_per_gas: u128::from(config.fixed_max_fee_per_gas),
                },
            )
        });
        Self {
            store,
            chains,
            ttl: config.cache_ttl(),
            fixed,
        }
    }

    /// Fee pair for `chain_id`
    pub async fn get_fees(&self, chain_id: ChainId) -> GasResult<FeePair> {
        if let Some((fixed_chain, fees)) = self.fixed {
            if fixed_chain == chain_id {
                return Ok(fees);
            }
        }

        let key = fee_cache_key(chain_id);
        if let Some(raw) = self.store.get(&key).await? {
            match serde_json::from_str::<FeeCacheEntry>(&raw).ok().and_then(|e| e.fees()) {
                Some(fees) => {
                    metrics().fee_cache_hits_total.inc();
                    return Ok(fees);
                }
                None => warn!(key = %key, "Discarding unreadable fee cache entry"),
            }
        }

        metrics().fee_cache_misses_total.inc();
        let reader = self.chains.reader(chain_id)?;
        let fees = reader.fee_estimate().await?;

        let entry = serde_json::to_string(&FeeCacheEntry::new(fees))
            .map_err(|e| GasError::Encoding(e.to_string()))?;
        self.store.set_with_ttl(&key, &entry, self.ttl).await?;

        debug!(
            chain_id = chain_id,
            max_priority_fee_per_gas = %fees.max_priority_fee_per_gas,
            max_fee_per_gas = %fees.max_fee_per_gas,
            "Fee pair refreshed from chain"
        );
        Ok(fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainClients;
    use crate::store::MemoryStore;
    use crate::test_utils::MockChain;

    const CHAIN: ChainId = 31337;

    fn setup(config: GasConfig) -> (Arc<MemoryStore>, Arc<MockChain>, GasFeeCache) {
        let store = Arc::new(MemoryStore::new());
        let chain = Arc::new(MockChain::new(CHAIN));
        let mut registry = ChainRegistry::new();
        registry.insert(CHAIN, ChainClients::from_shared(chain.clone()));
        let cache = GasFeeCache::new(store.clone(), Arc::new(registry), &config);
        (store, chain, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_query_within_ttl_and_refetch_after() {
        let (_store, chain, cache) = setup(GasConfig::default());
        chain.set_fees(FeePair {
            max_priority_fee_per_gas: 1_500_000_000,
            max_fee_per_gas: 340_282_366_920_938_463_463_374_607_431_768_211_455,
        });

        let first = cache.get_fees(CHAIN).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = cache.get_fees(CHAIN).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.fee_queries(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get_fees(CHAIN).await.unwrap();
        assert_eq!(chain.fee_queries(), 2);
    }

    #[tokio::test]
    async fn test_fixed_fee_chain_skips_chain_and_cache() {
        let (store, _chain, cache) = setup(GasConfig {
            fixed_fee_chain_id: Some(CHAIN),
            ..GasConfig::default()
        });

        let fees = cache.get_fees(CHAIN).await.unwrap();
        assert_eq!(fees.max_priority_fee_per_gas, 2_000_000_000);
        assert_eq!(fees.max_fee_per_gas, 60_000_000_000);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_entry_stored_as_decimal_strings() {
        let (store, chain, cache) = setup(GasConfig::default());
        chain.set_fees(FeePair {
            max_priority_fee_per_gas: 7,
            max_fee_per_gas: 11,
        });
        cache.get_fees(CHAIN).await.unwrap();

        let raw = store.get(&fee_cache_key(CHAIN)).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["maxPriorityFeePerGas"], "7");
        assert_eq!(json["maxFeePerGas"], "11");
        assert!(json["fetchedAt"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_chain() {
        let (_store, _chain, cache) = setup(GasConfig::default());
        assert!(matches!(cache.get_fees(1).await, Err(GasError::Chain(_))));
    }
}
