//! Service context
//!
//! Shared services are built once at startup and handed to the workers
//! explicitly. Tests build the same context from in-memory parts.

use crate::chain::{ChainError, ChainRegistry};
use crate::config::{Config, StoreBackend};
use crate::gas::GasFeeCache;
use crate::nonce::NonceCoordinator;
use crate::queue::JobQueue;
use crate::records::{MemoryRecordStore, PostgresRecordStore, RecordError, RecordStore};
use crate::relayer_pool::{Reconciliation, RelayerKey, RelayerKeyPool, RelayerPoolError};
use crate::store::{CoordinationStore, MemoryStore, RedisStore, StoreError};
use crate::types::Lane;
use crate::worker::{ScoreSubmissionHandler, Submitter, TxSubmissionHandler, Worker};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Failures while wiring the service together
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Coordination store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Record store unavailable: {0}")]
    Record(#[from] RecordError),

    #[error("Chain client setup failed: {0}")]
    Chain(#[from] ChainError),

    #[error("Relayer setup failed: {0}")]
    Relayer(#[from] RelayerPoolError),
}

pub type ContextResult<T> = Result<T, ContextError>;

/// Everything a worker needs, constructed once
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn CoordinationStore>,
    pub chains: Arc<ChainRegistry>,
    pub records: Arc<dyn RecordStore>,
    pub queue: JobQueue,
    pub relayers: RelayerKeyPool,
    pub nonces: NonceCoordinator,
    pub fees: GasFeeCache,
}

impl ServiceContext {
    /// Connect the configured backends and build the chain clients
    pub async fn connect(config: Config) -> ContextResult<Self> {
        let store: Arc<dyn CoordinationStore> = match config.store.backend {
            StoreBackend::Redis => {
                info!(url = %config.store.redis_url, "Connecting coordination store");
                Arc::new(RedisStore::connect(&config.store.redis_url).await?)
            }
            StoreBackend::Memory => {
                warn!("Using in-process coordination store; nonces are not shared across processes");
                Arc::new(MemoryStore::new())
            }
        };

        let records: Arc<dyn RecordStore> = match &config.secrets.database_url {
            Some(url) => Arc::new(PostgresRecordStore::connect(url).await?),
            None => {
                warn!("DATABASE_URL not set, transaction hashes are kept in memory only");
                Arc::new(MemoryRecordStore::new())
            }
        };

        let chains = ChainRegistry::from_config(&config.chains, config.gas.base_fee_multiplier_percent)?;
        for chain in &config.chains {
            info!(
                chain_id = chain.chain_id,
                name = %chain.name,
                backend_rpc = chain.backend_rpc_url.is_some(),
                "Chain client ready"
            );
        }

        Ok(Self::from_parts(config, store, Arc::new(chains), records))
    }

    /// Assemble a context from already constructed backends
    pub fn from_parts(
        config: Config,
        store: Arc<dyn CoordinationStore>,
        chains: Arc<ChainRegistry>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let queue = JobQueue::new(store.clone(), &config.queue);
        let relayers = RelayerKeyPool::new(store.clone());
        let nonces = NonceCoordinator::new(store.clone(), chains.clone(), &config.nonce);
        let fees = GasFeeCache::new(store.clone(), chains.clone(), &config.gas);

        Self {
            config: Arc::new(config),
            store,
            chains,
            records,
            queue,
            relayers,
            nonces,
            fees,
        }
    }

    /// Align the persisted relayer pool with the configured keys
    pub async fn reconcile_relayers(&self) -> ContextResult<Reconciliation> {
        let keys = &self.config.secrets.relayer_private_keys;
        if keys.is_empty() {
            warn!("RELAYER_PRIVATE_KEYS is empty, transaction jobs will be discarded");
        }
        Ok(self.relayers.reconcile(keys).await?)
    }

    pub fn submitter(&self) -> Submitter {
        Submitter::new(
            self.chains.clone(),
            self.nonces.clone(),
            self.fees.clone(),
            self.config.worker.pacing_delay(),
        )
    }

    /// Consumer of the transaction-processing lane
    pub fn tx_worker(&self) -> Worker {
        let handler = TxSubmissionHandler::new(
            self.relayers.clone(),
            self.records.clone(),
            self.submitter(),
        );
        self.worker(Lane::TransactionProcessing, self.config.queue.tx_concurrency, Arc::new(handler))
    }

    /// Consumer of the send-user-score lane, if a publisher key is configured
    pub fn score_worker(&self) -> ContextResult<Option<Worker>> {
        let Some(secret) = &self.config.secrets.score_publisher_private_key else {
            return Ok(None);
        };
        let publisher = RelayerKey::from_secret(secret)?;
        info!(publisher = %publisher.address, "Score publisher loaded");

        let handler = ScoreSubmissionHandler::new(publisher, self.records.clone(), self.submitter());
        Ok(Some(self.worker(
            Lane::SendUserScore,
            self.config.queue.score_concurrency,
            Arc::new(handler),
        )))
    }

    /// Release the store and record connections once every worker has drained
    pub fn close(self) {
        info!("Closing store connections");
        drop(self);
    }

    fn worker(
        &self,
        lane: Lane,
        concurrency: usize,
        handler: Arc<dyn crate::worker::JobHandler>,
    ) -> Worker {
        Worker::new(lane, concurrency, handler, self.queue.clone())
            .with_poll_interval(self.config.queue.poll_interval())
            .with_stalled_check_interval(self.config.queue.stalled_check_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChain;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_close_releases_store_after_workers_stop() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let chain_id = config.chains[0].chain_id;

        let store = Arc::new(MemoryStore::new());
        let weak_store = Arc::downgrade(&store);
        let mut registry = ChainRegistry::new();
        registry.insert(chain_id, crate::chain::ChainClients::from_shared(Arc::new(MockChain::new(chain_id))));
        let ctx = ServiceContext::from_parts(config, store, Arc::new(registry), Arc::new(MemoryRecordStore::new()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(ctx.tx_worker().run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        assert!(weak_store.upgrade().is_some());
        ctx.close();
        assert!(weak_store.upgrade().is_none());
    }
}
