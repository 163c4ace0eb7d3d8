//! Shared submission state machine
//!
//! `DEQUEUED -> RELAYER_SELECTED -> NONCE_ACQUIRED -> FEE_RESOLVED ->
//! SUBMITTED -> RECORDED`, or `FAILED` for the attempt. Both workers run the
//! same steps after choosing their signer; only the call and the record they
//! write differ.

use super::worker_errors::JobError;
use crate::chain::{ChainRegistry, ContractCall, SubmitRequest};
use crate::gas::GasFeeCache;
use crate::nonce::NonceCoordinator;
use crate::relayer_pool::RelayerKey;
use crate::structured_logging::JobLogger;
use crate::types::{ChainId, TxHash};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Steps of one job attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Dequeued,
    RelayerSelected,
    NonceAcquired,
    FeeResolved,
    Submitted,
    Recorded,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Dequeued => "DEQUEUED",
            JobState::RelayerSelected => "RELAYER_SELECTED",
            JobState::NonceAcquired => "NONCE_ACQUIRED",
            JobState::FeeResolved => "FEE_RESOLVED",
            JobState::Submitted => "SUBMITTED",
            JobState::Recorded => "RECORDED",
            JobState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Nonce, pacing, fees and submission for an already chosen signer
#[derive(Debug, Clone)]
pub struct Submitter {
    chains: Arc<ChainRegistry>,
    nonces: NonceCoordinator,
    fees: GasFeeCache,
    pacing_delay: Duration,
}

impl Submitter {
    pub fn new(
        chains: Arc<ChainRegistry>,
        nonces: NonceCoordinator,
        fees: GasFeeCache,
        pacing_delay: Duration,
    ) -> Self {
        Self {
            chains,
            nonces,
            fees,
            pacing_delay,
        }
    }

    /// Fail fast for chains without a client
    pub fn ensure_chain(&self, chain_id: ChainId) -> Result<(), JobError> {
        self.chains.writer(chain_id)?;
        Ok(())
    }

    /// Run NONCE_ACQUIRED through SUBMITTED for `call` signed by `relayer`.
    ///
    /// A nonce-too-low rejection evicts the cached slot for the relayer
    /// before the error is returned, so the retry re-reads the chain.
    pub async fn submit(
        &self,
        log: &JobLogger,
        chain_id: ChainId,
        relayer: &RelayerKey,
        call: ContractCall,
    ) -> Result<TxHash, JobError> {
        let writer = self.chains.writer(chain_id)?.clone();

        let nonce = self.nonces.acquire_nonce(chain_id, relayer.address).await?;
        log.log_nonce_acquired(relayer.address, nonce);

        if !self.pacing_delay.is_zero() {
            tokio::time::sleep(self.pacing_delay).await;
        }

        let fees = self.fees.get_fees(chain_id).await?;
        log.log_transition(JobState::FeeResolved);

        let submitted = writer
            .submit(SubmitRequest {
                signer: &relayer.signer,
                call,
                nonce,
                fees,
            })
            .await;

        match submitted {
            Ok(tx_hash) => {
                log.log_submitted(call.name(), relayer.address, nonce, tx_hash);
                Ok(tx_hash)
            }
            Err(err) if err.is_nonce_too_low() => {
                if let Err(e) = self.nonces.evict(chain_id, relayer.address).await {
                    log.warn(&format!("failed to evict nonce slot: {}", e));
                }
                log.log_nonce_evicted(relayer.address);
                Err(JobError::NonceTooLow {
                    chain_id,
                    address: relayer.address,
                    message: err.to_string(),
                })
            }
            Err(err) => {
                log.warn(&format!("{} submission failed: {}", call.name(), err));
                Err(err.into())
            }
        }
    }
}
