//! Score Submission Worker
//!
//! Consumes the `send-user-score` lane with a single fixed publisher key and
//! pushes `(player, scoreAmount, transactionAmount)` to the leaderboard.
//! It runs with concurrency 1 but still takes nonces from the coordinator,
//! so a second process sharing the publisher key stays consistent.

use super::runtime::{JobHandler, JobOutcome};
use super::submission::{JobState, Submitter};
use super::worker_errors::JobError;
use crate::chain::ContractCall;
use crate::queue::Job;
use crate::records::{GameOverField, GameOverKey, RecordStore};
use crate::relayer_pool::RelayerKey;
use crate::structured_logging::JobLogger;
use crate::types::{JobPayload, SendUserScoreJobData};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ScoreSubmissionHandler {
    publisher: RelayerKey,
    records: Arc<dyn RecordStore>,
    submitter: Submitter,
}

impl ScoreSubmissionHandler {
    pub fn new(publisher: RelayerKey, records: Arc<dyn RecordStore>, submitter: Submitter) -> Self {
        Self {
            publisher,
            records,
            submitter,
        }
    }

    async fn process(&self, data: &SendUserScoreJobData, log: &JobLogger) -> Result<JobOutcome, JobError> {
        let chain_id = data.chain_id;
        self.submitter.ensure_chain(chain_id)?;

        let key = GameOverKey {
            player_id: data.player_id,
            chain_id,
            session_id: data.session_id,
        };
        let field = GameOverField::ScoreTxHash;
        if let Some(existing) = self.records.game_over_tx_hash(key, field).await? {
            log.log_already_recorded(existing);
            return Ok(JobOutcome::AlreadyRecorded(existing));
        }

        log.log_relayer_selected(self.publisher.address);
        let call = ContractCall::UpdatePlayerData {
            player: data.player_address,
            score_amount: data.score_amount,
            transaction_amount: data.transaction_amount,
        };
        let tx_hash = self
            .submitter
            .submit(log, chain_id, &self.publisher, call)
            .await?;

        self.records.set_game_over_tx_hash(key, field, tx_hash).await?;
        log.log_transition(JobState::Recorded);
        Ok(JobOutcome::Recorded(tx_hash))
    }
}

#[async_trait]
impl JobHandler for ScoreSubmissionHandler {
    async fn handle(&self, job: &Job, log: &JobLogger) -> Result<JobOutcome, JobError> {
        match &job.data {
            JobPayload::SendUserScore(data) => self.process(data, log).await,
            JobPayload::Tx(_) => Err(JobError::Config(format!(
                "transaction payload on {} lane",
                job.lane
            ))),
        }
    }
}
