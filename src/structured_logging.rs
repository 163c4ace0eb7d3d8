//! Structured logging for job execution

use crate::queue::{FailOutcome, Job};
use crate::types::{ChainId, Lane, TxHash};
use crate::worker::JobState;
use alloy::primitives::Address;

/// Per-job structured logger; every event carries job id, lane and chain
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    lane: Lane,
    chain_id: ChainId,
    attempt: u32,
}

impl JobLogger {
    pub fn new(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            lane: job.lane,
            chain_id: job.data.chain_id(),
            attempt: job.attempt(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_transition(&self, state: JobState) {
        tracing::debug!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            attempt = self.attempt,
            state = %state,
            "Job state transition"
        );
    }

    pub fn log_relayer_selected(&self, relayer: Address) {
        tracing::debug!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            relayer = %relayer,
            state = %JobState::RelayerSelected,
            "Relayer selected"
        );
    }

    pub fn log_nonce_acquired(&self, relayer: Address, nonce: u64) {
        tracing::debug!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            relayer = %relayer,
            nonce = nonce,
            state = %JobState::NonceAcquired,
            "Nonce acquired"
        );
    }

    pub fn log_submitted(&self, call: &str, relayer: Address, nonce: u64, tx_hash: TxHash) {
        tracing::info!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            call = %call,
            relayer = %relayer,
            nonce = nonce,
            tx_hash = %tx_hash,
            state = %JobState::Submitted,
            "Transaction submitted"
        );
    }

    pub fn log_recorded(&self, tx_hash: TxHash, latency_ms: u64) {
        tracing::info!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            tx_hash = %tx_hash,
            latency_ms = latency_ms,
            state = %JobState::Recorded,
            "Job completed"
        );
    }

    pub fn log_already_recorded(&self, tx_hash: TxHash) {
        tracing::info!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            tx_hash = %tx_hash,
            "Hash already recorded, skipping submission"
        );
    }

    pub fn log_nonce_evicted(&self, relayer: Address) {
        tracing::warn!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            relayer = %relayer,
            "Nonce too low, cached nonce evicted"
        );
    }

    pub fn log_failure(&self, error: &str, outcome: FailOutcome) {
        match outcome {
            FailOutcome::Retrying {
                attempts_made,
                retry_in,
            } => tracing::warn!(
                job_id = %self.job_id,
                lane = %self.lane,
                chain_id = self.chain_id,
                attempts_made = attempts_made,
                retry_in_ms = retry_in.as_millis() as u64,
                error = %error,
                state = %JobState::Failed,
                "Job attempt failed, retry scheduled"
            ),
            FailOutcome::Discarded { attempts_made } => tracing::error!(
                job_id = %self.job_id,
                lane = %self.lane,
                chain_id = self.chain_id,
                attempts_made = attempts_made,
                error = %error,
                state = %JobState::Failed,
                "Job attempt failed, no attempts left"
            ),
        }
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            job_id = %self.job_id,
            lane = %self.lane,
            chain_id = self.chain_id,
            message = %message,
            "Warning"
        );
    }
}
