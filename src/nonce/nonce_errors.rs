use crate::chain::ChainError;
use crate::store::StoreError;
use crate::types::ChainId;
use alloy::primitives::Address;
use thiserror::Error;

/// Nonce coordinator errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NonceError {
    /// The (chain, address) lock stayed held for the whole poll window
    #[error("Timed out acquiring nonce lock for {address} on chain {chain_id} after {attempts} attempts")]
    LockTimeout {
        chain_id: ChainId,
        address: Address,
        attempts: u32,
    },

    /// Chain-truth fallback failed
    #[error("Chain error while reading nonce: {0}")]
    Chain(#[from] ChainError),

    /// Coordination store failure
    #[error("Store error while issuing nonce: {0}")]
    Store(#[from] StoreError),
}

impl NonceError {
    /// Check if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            NonceError::LockTimeout { .. } => true,
            NonceError::Chain(err) => err.is_retryable(),
            NonceError::Store(err) => err.is_transient(),
        }
    }
}

/// Result type for nonce operations
pub type NonceResult<T> = Result<T, NonceError>;
