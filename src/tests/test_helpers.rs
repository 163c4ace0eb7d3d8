#![allow(dead_code)]
//! Test Helper Utilities
//!
//! Builds a complete `ServiceContext` on top of the in-memory store, the
//! in-memory record store and a scripted `MockChain`, so scenario tests run
//! the real queue, relayer pool, nonce coordinator and fee cache.

use crate::chain::{ChainClients, ChainRegistry};
use crate::config::{Config, StoreBackend};
use crate::context::ServiceContext;
use crate::queue::{Job, JobOptions};
use crate::records::{GameOverKey, MemoryRecordStore};
use crate::store::MemoryStore;
use crate::test_utils::{MockChain, ANVIL_PRIVATE_KEYS};
use crate::types::{ChainId, JobPayload, Lane};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Chain every harness registers
pub const CHAIN_ID: ChainId = 31337;

/// Index into `ANVIL_PRIVATE_KEYS` used as the score publisher
pub const PUBLISHER_KEY_INDEX: usize = 2;

pub struct Harness {
    pub ctx: ServiceContext,
    pub chain: Arc<MockChain>,
    pub records: Arc<MemoryRecordStore>,
    pub store: Arc<MemoryStore>,
}

/// Configuration with pacing disabled and short queue timings
pub fn test_config(relayer_keys: usize) -> Config {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.chains[0].leaderboard = Some(Address::repeat_byte(0x02));
    config.worker.pacing_delay_ms = 0;
    config.queue.backoff_ms = 10;
    config.queue.poll_interval_ms = 5;
    config.queue.stalled_check_interval_ms = 1_000;
    config.queue.tx_concurrency = 8;
    config.secrets.relayer_private_keys = ANVIL_PRIVATE_KEYS[..relayer_keys]
        .iter()
        .map(|k| Zeroizing::new(k.to_string()))
        .collect();
    config.secrets.score_publisher_private_key =
        Some(Zeroizing::new(ANVIL_PRIVATE_KEYS[PUBLISHER_KEY_INDEX].to_string()));
    config
}

/// Harness over `config`, with the relayer pool reconciled
pub async fn harness_with(config: Config) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(MockChain::new(CHAIN_ID));
    let records = Arc::new(MemoryRecordStore::new());

    let mut registry = ChainRegistry::new();
    registry.insert(CHAIN_ID, ChainClients::from_shared(chain.clone()));

    let ctx = ServiceContext::from_parts(config, store.clone(), Arc::new(registry), records.clone());
    ctx.reconcile_relayers().await.unwrap();

    Harness {
        ctx,
        chain,
        records,
        store,
    }
}

/// Harness with the first `relayer_keys` development keys in the pool
pub async fn harness(relayer_keys: usize) -> Harness {
    harness_with(test_config(relayer_keys)).await
}

pub fn key_address(index: usize) -> Address {
    PrivateKeySigner::from_str(ANVIL_PRIVATE_KEYS[index])
        .unwrap()
        .address()
}

pub fn game_over_key(player_id: i64, session_id: u64) -> GameOverKey {
    GameOverKey {
        player_id,
        chain_id: CHAIN_ID,
        session_id,
    }
}

impl Harness {
    /// Enqueue `payload` and claim it straight back
    pub async fn enqueue_and_claim(&self, payload: impl Into<JobPayload>) -> Job {
        let payload = payload.into();
        let lane: Lane = payload.lane();
        self.ctx
            .queue
            .add_job(payload, JobOptions::default())
            .await
            .unwrap();
        self.ctx.queue.claim(lane).await.unwrap().unwrap()
    }
}
