//! Distributed lock guarding one nonce slot
//!
//! The lock is a store key written with set-if-absent and a TTL. Its value is
//! a random owner token, so release only deletes the key while this holder
//! still owns it; a holder that outlived the TTL cannot free a successor's lock.
//!
//! # RAII Contract
//!
//! - `release()` consumes the guard and deletes the key before returning
//! - Dropping an unreleased guard schedules the delete on the runtime and
//!   logs a warning; the TTL bounds the damage if no runtime is available

use super::nonce_errors::{NonceError, NonceResult};
use crate::metrics::metrics;
use crate::store::CoordinationStore;
use crate::types::ChainId;
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Polling parameters for lock acquisition
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub ttl: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

/// A held nonce lock
pub struct NonceLock {
    store: Arc<dyn CoordinationStore>,
    key: String,
    token: String,
    acquired_at: Instant,
    released: bool,
}

impl NonceLock {
    /// Poll set-if-absent on `key` until it succeeds or the attempts run out
    pub async fn acquire(
        store: Arc<dyn CoordinationStore>,
        key: String,
        policy: LockPolicy,
        chain_id: ChainId,
        address: Address,
    ) -> NonceResult<Self> {
        let token = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        for attempt in 1..=policy.max_attempts {
            if store.set_if_absent(&key, &token, policy.ttl).await? {
                metrics()
                    .nonce_lock_wait
                    .observe(started.elapsed().as_secs_f64());
                debug!(lock = %key, attempt = attempt, "Nonce lock acquired");
                return Ok(Self {
                    store,
                    key,
                    token,
                    acquired_at: Instant::now(),
                    released: false,
                });
            }
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.poll_interval).await;
            }
        }

        metrics().nonce_lock_timeouts_total.inc();
        warn!(
            chain_id = chain_id,
            address = %address,
            attempts = policy.max_attempts,
            waited_ms = started.elapsed().as_millis() as u64,
            "Nonce lock acquisition timed out"
        );
        Err(NonceError::LockTimeout {
            chain_id,
            address,
            attempts: policy.max_attempts,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Explicitly release the lock
    pub async fn release(mut self) -> NonceResult<()> {
        self.released = true;
        let deleted = self.store.delete_if_equals(&self.key, &self.token).await?;
        if !deleted {
            warn!(
                lock = %self.key,
                held_for_ms = self.acquired_at.elapsed().as_millis() as u64,
                "Nonce lock expired before release"
            );
        }
        Ok(())
    }
}

impl Drop for NonceLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        warn!(
            lock = %key,
            held_for_ms = self.acquired_at.elapsed().as_millis() as u64,
            release_type = "auto_drop",
            "Nonce lock released on drop - should be explicitly released"
        );

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = store.delete_if_equals(&key, &token).await {
                    warn!(lock = %key, error = %e, "Failed to release dropped nonce lock");
                }
            });
        }
    }
}
