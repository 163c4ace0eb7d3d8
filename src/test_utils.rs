//! Test Utilities Module
//!
//! Scripted chain client and fixtures for deterministic tests of the nonce
//! coordinator, fee cache and submission workers without a node.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::chain::{ChainError, ChainReader, ChainResult, ContractCall, ContractWriter, SubmitRequest};
use crate::types::{ChainId, FeePair, TxHash};
use alloy::primitives::{keccak256, Address};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Well-known development keys (anvil accounts 0..3)
pub const ANVIL_PRIVATE_KEYS: [&str; 3] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

/// A transaction accepted by `MockChain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub from: Address,
    pub call: ContractCall,
    pub nonce: u64,
    pub fees: FeePair,
    pub tx_hash: TxHash,
}

/// Mock chain for testing
///
/// Tracks nonces per address the way a node's pending pool does: a nonce
/// below the confirmed count or one already used is rejected as nonce too
/// low, any other nonce is accepted even if it arrives out of order. Hashes
/// are derived deterministically from chain, sender and nonce.
#[derive(Debug)]
pub struct MockChain {
    chain_id: ChainId,
    confirmed: Mutex<HashMap<Address, u64>>,
    used_nonces: Mutex<HashMap<Address, HashSet<u64>>>,
    fees: Mutex<FeePair>,
    submissions: Mutex<Vec<RecordedSubmission>>,
    scripted_failures: Mutex<VecDeque<ChainError>>,
    transaction_count_queries: AtomicUsize,
    fee_queries: AtomicUsize,
}

impl MockChain {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            confirmed: Mutex::new(HashMap::new()),
            used_nonces: Mutex::new(HashMap::new()),
            fees: Mutex::new(FeePair {
                max_priority_fee_per_gas: 1_000_000_000,
                max_fee_per_gas: 3_000_000_000,
            }),
            submissions: Mutex::new(Vec::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            transaction_count_queries: AtomicUsize::new(0),
            fee_queries: AtomicUsize::new(0),
        }
    }

    /// Set the confirmed transaction count of `address`
    pub fn set_transaction_count(&self, address: Address, count: u64) {
        self.confirmed.lock().insert(address, count);
    }

    fn pending_count(&self, address: Address) -> u64 {
        let confirmed = self.confirmed.lock().get(&address).copied().unwrap_or(0);
        let used = self
            .used_nonces
            .lock()
            .get(&address)
            .and_then(|nonces| nonces.iter().max().map(|n| n + 1))
            .unwrap_or(0);
        confirmed.max(used)
    }

    pub fn set_fees(&self, fees: FeePair) {
        *self.fees.lock() = fees;
    }

    /// Make the next submission fail with `err` before any nonce check
    pub fn fail_next_submit(&self, err: ChainError) {
        self.scripted_failures.lock().push_back(err);
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().clone()
    }

    pub fn transaction_count_queries(&self) -> usize {
        self.transaction_count_queries.load(Ordering::SeqCst)
    }

    pub fn fee_queries(&self) -> usize {
        self.fee_queries.load(Ordering::SeqCst)
    }

    pub fn expected_hash(chain_id: ChainId, from: Address, nonce: u64) -> TxHash {
        let mut preimage = Vec::with_capacity(8 + 20 + 8);
        preimage.extend_from_slice(&chain_id.to_be_bytes());
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.transaction_count_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending_count(address))
    }

    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128> {
        Ok(self.fees.lock().max_priority_fee_per_gas)
    }

    async fn fee_estimate(&self) -> ChainResult<FeePair> {
        self.fee_queries.fetch_add(1, Ordering::SeqCst);
        Ok(*self.fees.lock())
    }
}

#[async_trait]
impl ContractWriter for MockChain {
    async fn submit(&self, request: SubmitRequest<'_>) -> ChainResult<TxHash> {
        if let Some(err) = self.scripted_failures.lock().pop_front() {
            return Err(err);
        }

        let from = request.signer.address();
        let confirmed = self.confirmed.lock().get(&from).copied().unwrap_or(0);
        {
            let mut used = self.used_nonces.lock();
            let nonces = used.entry(from).or_default();
            if request.nonce < confirmed || !nonces.insert(request.nonce) {
                return Err(ChainError::classify(
                    self.chain_id,
                    format!("nonce too low: tx nonce {} already used", request.nonce),
                    Some(-32000),
                ));
            }
        }

        let tx_hash = Self::expected_hash(self.chain_id, from, request.nonce);
        self.submissions.lock().push(RecordedSubmission {
            from,
            call: request.call,
            nonce: request.nonce,
            fees: request.fees,
            tx_hash,
        });
        Ok(tx_hash)
    }
}
