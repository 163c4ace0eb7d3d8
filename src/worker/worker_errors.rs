use crate::chain::ChainError;
use crate::gas::GasError;
use crate::nonce::NonceError;
use crate::records::RecordError;
use crate::relayer_pool::RelayerPoolError;
use crate::store::StoreError;
use crate::types::ChainId;
use alloy::primitives::Address;
use thiserror::Error;

/// Failure of one job attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    /// Nonce lock unobtainable within the poll window
    #[error("Nonce lock timeout for {address} on chain {chain_id}")]
    LockTimeout { chain_id: ChainId, address: Address },

    /// The chain rejected the nonce; the cached slot has been evicted
    #[error("Nonce too low for {address} on chain {chain_id}: {message}")]
    NonceTooLow {
        chain_id: ChainId,
        address: Address,
        message: String,
    },

    /// No relayer keys configured
    #[error("No relayer keys available")]
    RelayerPoolEmpty,

    #[error("Chain error: {0}")]
    Chain(ChainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Misconfiguration or a payload this worker cannot handle
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No client configured for chain {0}")]
    UnknownChain(ChainId),
}

impl JobError {
    /// Whether another attempt could succeed.
    ///
    /// Configuration failures would fail identically on every attempt, so
    /// the queue discards those jobs right away.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::LockTimeout { .. } => true,
            JobError::NonceTooLow { .. } => true,
            JobError::RelayerPoolEmpty => false,
            JobError::Chain(err) => err.is_retryable(),
            JobError::Store(_) => true,
            JobError::Record(_) => true,
            JobError::Config(_) => false,
            JobError::UnknownChain(_) => false,
        }
    }
}

impl From<ChainError> for JobError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::UnknownChain(chain_id) => JobError::UnknownChain(chain_id),
            other => JobError::Chain(other),
        }
    }
}

impl From<NonceError> for JobError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::LockTimeout {
                chain_id, address, ..
            } => JobError::LockTimeout { chain_id, address },
            NonceError::Chain(err) => err.into(),
            NonceError::Store(err) => JobError::Store(err),
        }
    }
}

impl From<RelayerPoolError> for JobError {
    fn from(err: RelayerPoolError) -> Self {
        match err {
            RelayerPoolError::Empty => JobError::RelayerPoolEmpty,
            RelayerPoolError::InvalidKey => JobError::Config(err.to_string()),
            RelayerPoolError::Store(err) => JobError::Store(err),
        }
    }
}

impl From<GasError> for JobError {
    fn from(err: GasError) -> Self {
        match err {
            GasError::Chain(err) => err.into(),
            GasError::Store(err) => JobError::Store(err),
            GasError::Encoding(message) => JobError::Store(StoreError::Corrupt {
                key: "gas_fees".to_string(),
                message,
            }),
        }
    }
}
