use crate::types::ChainId;
use alloy::transports::{RpcError, TransportErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Messages EVM nodes use when a submitted nonce is already consumed
static NONCE_TOO_LOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)nonce (is )?too low|invalid nonce.*lower than|nonce has already been used")
        .expect("Failed to compile nonce-too-low pattern")
});

/// Chain client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    /// JSON-RPC or transport failure
    #[error("RPC error on chain {chain_id}: {message} (code: {code:?})")]
    Rpc {
        chain_id: ChainId,
        message: String,
        code: Option<i64>,
    },

    /// The node rejected the transaction because its nonce is already used
    #[error("Nonce too low on chain {chain_id}: {message}")]
    NonceTooLow { chain_id: ChainId, message: String },

    /// Building or signing the transaction failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// The requested call targets a contract that is not configured for the chain
    #[error("Contract {contract} is not configured on chain {chain_id}")]
    MissingContract {
        chain_id: ChainId,
        contract: &'static str,
    },

    /// No client is registered for the chain
    #[error("Unknown chain: {0}")]
    UnknownChain(ChainId),
}

impl ChainError {
    /// Classify a transport error, promoting nonce rejections to `NonceTooLow`
    pub fn from_rpc_error(err: RpcError<TransportErrorKind>, chain_id: ChainId) -> Self {
        let (message, code) = match err.as_error_resp() {
            Some(payload) => (payload.message.to_string(), Some(payload.code)),
            None => (err.to_string(), None),
        };
        Self::classify(chain_id, message, code)
    }

    /// Classify a raw error message and optional JSON-RPC code
    pub fn classify(chain_id: ChainId, message: String, code: Option<i64>) -> Self {
        if NONCE_TOO_LOW.is_match(&message) {
            ChainError::NonceTooLow { chain_id, message }
        } else {
            ChainError::Rpc {
                chain_id,
                message,
                code,
            }
        }
    }

    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, ChainError::NonceTooLow { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Rpc { .. } => true,
            ChainError::NonceTooLow { .. } => true,
            ChainError::Signing(_) => false,
            ChainError::MissingContract { .. } => false,
            ChainError::UnknownChain(_) => false,
        }
    }
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;
