//! Job envelope stored for every enqueued payload

use crate::types::{JobPayload, Lane};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-enqueue options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Time before the job becomes claimable
    pub delay: Duration,
}

impl JobOptions {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

/// A job as persisted in its lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub lane: Lane,
    pub name: String,
    pub data: JobPayload,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub delay_ms: u64,
    pub created_at_ms: u64,
}

impl Job {
    /// 1-based number of the attempt currently running
    pub fn attempt(&self) -> u32 {
        self.attempts_made + 1
    }

    /// Whether another attempt is allowed after the current one fails
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxJobData, TxPayload};
    use alloy::primitives::Address;

    fn job(attempts_made: u32) -> Job {
        Job {
            id: "1".to_string(),
            lane: Lane::TransactionProcessing,
            name: Lane::TransactionProcessing.job_name().to_string(),
            data: TxJobData {
                chain_id: 31337,
                player: Address::ZERO,
                session_id: 1,
                payload: TxPayload::UpdateHighscoreTx { player_id: 3 },
            }
            .into(),
            attempts_made,
            max_attempts: 3,
            backoff_ms: 2_000,
            delay_ms: 0,
            created_at_ms: 0,
        }
    }

    #[test]
    fn test_attempt_accounting() {
        assert!(job(0).has_attempts_left());
        assert!(job(1).has_attempts_left());
        assert!(!job(2).has_attempts_left());
        assert_eq!(job(2).attempt(), 3);
    }

    #[test]
    fn test_envelope_json_shape() {
        let json = serde_json::to_value(job(0)).unwrap();
        assert_eq!(json["lane"], "transaction-processing");
        assert_eq!(json["name"], "process-transaction");
        assert_eq!(json["data"]["kind"], "Tx");
        assert_eq!(json["data"]["data"]["payload"]["type"], "UpdateHighscoreTx");
        assert_eq!(json["attemptsMade"], 0);
    }
}
