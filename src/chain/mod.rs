//! Chain Access Module
//!
//! Per-chain read and write clients. Reads cover what the coordinator and the
//! fee cache need (transaction count, fee estimation); writes sign and submit
//! one score-manager or leaderboard call with an explicit nonce and fee pair.
//! Clients are built once at startup and shared read-only by every worker.

use crate::config::ChainConfig;
use crate::types::{ChainId, FeePair, SessionId, TxHash};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub mod chain_errors;
pub mod evm_client;

pub use chain_errors::{ChainError, ChainResult};
pub use evm_client::EvmClient;

/// Contract entrypoints the relayer submits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractCall {
    /// `ScoreManager.updateHighScore(player)`
    UpdateHighScore { player: Address },

    /// `ScoreManager.storeScore(player, sessionIndex)`
    StoreScore {
        player: Address,
        session_id: SessionId,
    },

    /// `Leaderboard.updatePlayerData(player, scoreAmount, transactionAmount)`
    UpdatePlayerData {
        player: Address,
        score_amount: u64,
        transaction_amount: u64,
    },
}

impl ContractCall {
    /// Entrypoint name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            ContractCall::UpdateHighScore { .. } => "updateHighScore",
            ContractCall::StoreScore { .. } => "storeScore",
            ContractCall::UpdatePlayerData { .. } => "updatePlayerData",
        }
    }
}

/// One signed submission
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub signer: &'a PrivateKeySigner,
    pub call: ContractCall,
    pub nonce: u64,
    pub fees: FeePair,
}

/// Read access to a chain
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Transaction count of `address`, including pending transactions
    async fn transaction_count(&self, address: Address) -> ChainResult<u64>;

    /// Node-suggested priority fee per gas, in wei
    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128>;

    /// Full EIP-1559 fee estimate for the next block
    async fn fee_estimate(&self) -> ChainResult<FeePair>;
}

/// Signing and submission of contract calls
#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// Sign and broadcast `request`, returning the transaction hash
    async fn submit(&self, request: SubmitRequest<'_>) -> ChainResult<TxHash>;
}

/// Read and write clients for one chain
#[derive(Clone)]
pub struct ChainClients {
    pub reader: Arc<dyn ChainReader>,
    pub writer: Arc<dyn ContractWriter>,
}

impl ChainClients {
    /// Use one value for both roles
    pub fn from_shared<C>(client: Arc<C>) -> Self
    where
        C: ChainReader + ContractWriter + 'static,
    {
        Self {
            reader: client.clone(),
            writer: client,
        }
    }
}

/// Chain clients keyed by chain id
#[derive(Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainId, ChainClients>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one alloy client per configured chain
    pub fn from_config(chains: &[ChainConfig], base_fee_multiplier_percent: u64) -> ChainResult<Self> {
        let mut registry = Self::new();
        for chain in chains {
            let client =
                EvmClient::from_config(chain)?.with_base_fee_multiplier(base_fee_multiplier_percent);
            registry.insert(chain.chain_id, ChainClients::from_shared(Arc::new(client)));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, chain_id: ChainId, clients: ChainClients) {
        self.chains.insert(chain_id, clients);
    }

    pub fn reader(&self, chain_id: ChainId) -> ChainResult<&Arc<dyn ChainReader>> {
        self.chains
            .get(&chain_id)
            .map(|c| &c.reader)
            .ok_or(ChainError::UnknownChain(chain_id))
    }

    pub fn writer(&self, chain_id: ChainId) -> ChainResult<&Arc<dyn ContractWriter>> {
        self.chains
            .get(&chain_id)
            .map(|c| &c.writer)
            .ok_or(ChainError::UnknownChain(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chains", &self.chain_ids())
            .finish()
    }
}
