//! Relayer Key Pool
//!
//! Fee-paying signer identities kept in a sorted set of the coordination
//! store, scored by how often each has been handed out. Selection reads the
//! lowest-scored key and then increments its score; the two steps are not
//! atomic, so concurrent selections may briefly pick the same key. Every
//! selection still bumps the score, which pulls the pool back to even usage.

use crate::metrics::metrics;
use crate::store::{CoordinationStore, StoreError};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Store key of the relayer sorted set
pub const RELAYER_KEYS_SET: &str = "relayer_keys";

/// Relayer pool errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelayerPoolError {
    /// No relayer keys configured
    #[error("Relayer pool is empty")]
    Empty,

    /// A pooled entry is not a valid secp256k1 secret (the value is never printed)
    #[error("Relayer pool holds an invalid private key")]
    InvalidKey,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RelayerPoolResult<T> = Result<T, RelayerPoolError>;

/// Result of comparing the configured keys with the persisted pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Reseeded { count: usize },
}

/// A selected relayer
#[derive(Clone)]
pub struct RelayerKey {
    pub signer: PrivateKeySigner,
    pub address: Address,
}

impl std::fmt::Debug for RelayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RelayerKey {
    pub fn from_secret(secret: &str) -> RelayerPoolResult<Self> {
        let signer = PrivateKeySigner::from_str(secret).map_err(|_| RelayerPoolError::InvalidKey)?;
        let address = signer.address();
        Ok(Self { signer, address })
    }
}

/// Fairness-rotated pool of relayer keys
#[derive(Debug, Clone)]
pub struct RelayerKeyPool {
    store: Arc<dyn CoordinationStore>,
    key: String,
}

impl RelayerKeyPool {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            key: RELAYER_KEYS_SET.to_string(),
        }
    }

    /// Align the persisted pool with `configured`.
    ///
    /// Any difference in membership clears the pool and reseeds every
    /// configured key at score 0; an identical set keeps existing scores.
    pub async fn reconcile(
        &self,
        configured: &[Zeroizing<String>],
    ) -> RelayerPoolResult<Reconciliation> {
        let wanted: HashSet<&str> = configured.iter().map(|k| k.as_str()).collect();
        let persisted = self.store.zrange(&self.key, 0, -1).await?;
        let existing: HashSet<&str> = persisted.iter().map(String::as_str).collect();

        if wanted == existing {
            debug!(keys = wanted.len(), "Relayer pool matches configuration");
            return Ok(Reconciliation::Unchanged);
        }

        self.store.delete(&self.key).await?;
        let members: Vec<(String, f64)> = wanted.iter().map(|k| (k.to_string(), 0.0)).collect();
        self.store.zadd(&self.key, &members).await?;

        info!(
            previous = existing.len(),
            keys = members.len(),
            "Relayer pool reseeded from configuration"
        );
        Ok(Reconciliation::Reseeded {
            count: members.len(),
        })
    }

    /// Hand out the least-used key and charge one use to it
    pub async fn select(&self) -> RelayerPoolResult<RelayerKey> {
        let lowest = self.store.zrange(&self.key, 0, 0).await?;
        let secret = Zeroizing::new(lowest.into_iter().next().ok_or(RelayerPoolError::Empty)?);

        self.store.zincrby(&self.key, &secret, 1.0).await?;
        metrics().relayer_selections_total.inc();

        let key = RelayerKey::from_secret(&secret)?;
        debug!(relayer = %key.address, "Relayer selected");
        Ok(key)
    }

    /// Current usage score per relayer address, ascending
    pub async fn usage_scores(&self) -> RelayerPoolResult<Vec<(Address, u64)>> {
        let entries = self.store.zrange_with_scores(&self.key).await?;
        entries
            .into_iter()
            .map(|(secret, score)| {
                let secret = Zeroizing::new(secret);
                let key = RelayerKey::from_secret(&secret)?;
                Ok((key.address, score.max(0.0) as u64))
            })
            .collect()
    }

    pub async fn len(&self) -> RelayerPoolResult<usize> {
        Ok(self.store.zcard(&self.key).await?)
    }
}
