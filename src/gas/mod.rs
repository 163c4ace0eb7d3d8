//! Gas Fee Cache Module

pub mod fee_cache;

pub use fee_cache::{fee_cache_key, GasFeeCache};

use crate::chain::ChainError;
use crate::store::StoreError;
use thiserror::Error;

/// Fee resolution errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GasError {
    #[error("Chain error while estimating fees: {0}")]
    Chain(#[from] ChainError),

    #[error("Store error in fee cache: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode fee cache entry: {0}")]
    Encoding(String),
}

pub type GasResult<T> = Result<T, GasError>;
