//! Transaction Submission Worker
//!
//! Consumes the `transaction-processing` lane. Every job rotates to the
//! least-used relayer key, then calls the score manager: `updateHighScore`
//! for a highscore update (hash stored on the game-over record) or
//! `storeScore` for a single move (hash stored on the move record).

use super::runtime::{JobHandler, JobOutcome};
use super::submission::{JobState, Submitter};
use super::worker_errors::JobError;
use crate::chain::ContractCall;
use crate::queue::Job;
use crate::records::{GameOverField, GameOverKey, RecordStore};
use crate::relayer_pool::RelayerKeyPool;
use crate::structured_logging::JobLogger;
use crate::types::{JobPayload, TxJobData, TxPayload};
use async_trait::async_trait;
use std::sync::Arc;

pub struct TxSubmissionHandler {
    relayers: RelayerKeyPool,
    records: Arc<dyn RecordStore>,
    submitter: Submitter,
}

impl TxSubmissionHandler {
    pub fn new(relayers: RelayerKeyPool, records: Arc<dyn RecordStore>, submitter: Submitter) -> Self {
        Self {
            relayers,
            records,
            submitter,
        }
    }

    async fn process(&self, data: &TxJobData, log: &JobLogger) -> Result<JobOutcome, JobError> {
        let chain_id = data.chain_id;
        self.submitter.ensure_chain(chain_id)?;

        match data.payload {
            TxPayload::UpdateHighscoreTx { player_id } => {
                let key = GameOverKey {
                    player_id,
                    chain_id,
                    session_id: data.session_id,
                };
                let field = GameOverField::HighscoreTxHash;
                if let Some(existing) = self.records.game_over_tx_hash(key, field).await? {
                    log.log_already_recorded(existing);
                    return Ok(JobOutcome::AlreadyRecorded(existing));
                }

                let relayer = self.relayers.select().await?;
                log.log_relayer_selected(relayer.address);

                let call = ContractCall::UpdateHighScore {
                    player: data.player,
                };
                let tx_hash = self.submitter.submit(log, chain_id, &relayer, call).await?;
                self.records.set_game_over_tx_hash(key, field, tx_hash).await?;
                log.log_transition(JobState::Recorded);
                Ok(JobOutcome::Recorded(tx_hash))
            }
            TxPayload::PlayerMoveTx { player_move_id } => {
                if let Some(existing) = self.records.player_move_tx_hash(player_move_id).await? {
                    log.log_already_recorded(existing);
                    return Ok(JobOutcome::AlreadyRecorded(existing));
                }

                let relayer = self.relayers.select().await?;
                log.log_relayer_selected(relayer.address);

                let call = ContractCall::StoreScore {
                    player: data.player,
                    session_id: data.session_id,
                };
                let tx_hash = self.submitter.submit(log, chain_id, &relayer, call).await?;
                self.records
                    .set_player_move_tx_hash(player_move_id, tx_hash)
                    .await?;
                log.log_transition(JobState::Recorded);
                Ok(JobOutcome::Recorded(tx_hash))
            }
        }
    }
}

#[async_trait]
impl JobHandler for TxSubmissionHandler {
    async fn handle(&self, job: &Job, log: &JobLogger) -> Result<JobOutcome, JobError> {
        match &job.data {
            JobPayload::Tx(data) => self.process(data, log).await,
            JobPayload::SendUserScore(_) => Err(JobError::Config(format!(
                "score payload on {} lane",
                job.lane
            ))),
        }
    }
}
