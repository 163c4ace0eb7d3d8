//! Per-(chain, address) nonce issuance shared by every worker process
//!
//! Under the slot lock the coordinator either hands out the cached next
//! nonce or, when the cache is cold or expired, reads the pending transaction
//! count from the chain and treats it as ground truth. Either way the slot is
//! rewritten with `nonce + 1` and a short TTL, so drift caused by transactions
//! sent outside this system heals on its own once the slot expires.

use super::nonce_errors::NonceResult;
use super::nonce_lock::{LockPolicy, NonceLock};
use crate::chain::ChainRegistry;
use crate::config::NonceConfig;
use crate::metrics::metrics;
use crate::store::CoordinationStore;
use crate::types::ChainId;
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store key of the cached next nonce
pub fn nonce_slot_key(chain_id: ChainId, address: Address) -> String {
    format!("{}:{}:nonce", chain_id, address)
}

/// Store key of the lock guarding a nonce slot
pub fn nonce_lock_key(chain_id: ChainId, address: Address) -> String {
    format!("{}:lock", nonce_slot_key(chain_id, address))
}

/// Where an issued nonce came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSource {
    Cache,
    Chain,
}

/// Distributed nonce coordinator
#[derive(Debug, Clone)]
pub struct NonceCoordinator {
    store: Arc<dyn CoordinationStore>,
    chains: Arc<ChainRegistry>,
    lock_policy: LockPolicy,
    slot_ttl: Duration,
}

impl NonceCoordinator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        chains: Arc<ChainRegistry>,
        config: &NonceConfig,
    ) -> Self {
        Self {
            store,
            chains,
            lock_policy: LockPolicy {
                ttl: config.lock_ttl(),
                poll_interval: config.lock_poll_interval(),
                max_attempts: config.lock_max_attempts,
            },
            slot_ttl: config.slot_ttl(),
        }
    }

    /// Issue the next nonce for `address` on `chain_id`
    pub async fn acquire_nonce(&self, chain_id: ChainId, address: Address) -> NonceResult<u64> {
        let lock = NonceLock::acquire(
            self.store.clone(),
            nonce_lock_key(chain_id, address),
            self.lock_policy,
            chain_id,
            address,
        )
        .await?;

        let issued = self.issue_locked(chain_id, address).await;

        // Release regardless of the issuance outcome
        let released = lock.release().await;

        let (nonce, source) = issued?;
        if let Err(e) = released {
            warn!(chain_id = chain_id, address = %address, error = %e, "Failed to release nonce lock");
        }

        debug!(
            chain_id = chain_id,
            address = %address,
            nonce = nonce,
            source = ?source,
            "Nonce issued"
        );
        Ok(nonce)
    }

    async fn issue_locked(&self, chain_id: ChainId, address: Address) -> NonceResult<(u64, NonceSource)> {
        let slot = nonce_slot_key(chain_id, address);

        let cached = match self.store.get(&slot).await? {
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(slot = %slot, "Discarding unparsable nonce slot");
                    None
                }
            },
            None => None,
        };

        let (nonce, source) = match cached {
            Some(value) => (value, NonceSource::Cache),
            None => {
                let reader = self.chains.reader(chain_id)?;
                let count = reader.transaction_count(address).await?;
                metrics().nonce_chain_resyncs_total.inc();
                info!(chain_id = chain_id, address = %address, nonce = count, "Nonce synced from chain");
                (count, NonceSource::Chain)
            }
        };

        self.store
            .set_with_ttl(&slot, &(nonce + 1).to_string(), self.slot_ttl)
            .await?;
        Ok((nonce, source))
    }

    /// Forget the cached next nonce so the next issuance re-reads the chain
    pub async fn evict(&self, chain_id: ChainId, address: Address) -> NonceResult<()> {
        let existed = self.store.delete(&nonce_slot_key(chain_id, address)).await?;
        metrics().nonce_cache_evictions_total.inc();
        info!(chain_id = chain_id, address = %address, existed = existed, "Nonce slot evicted");
        Ok(())
    }
}
