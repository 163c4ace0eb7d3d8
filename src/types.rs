//! Common types used throughout the relayer

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// EVM chain id
pub type ChainId = u64;

/// Game session index (stored on-chain as `uint256`)
pub type SessionId = u64;

/// Record-store primary key of a player
pub type PlayerId = i64;

/// Record-store primary key of a player move
pub type PlayerMoveId = i64;

/// Transaction hash returned by the chain on submission
pub type TxHash = B256;

/// EIP-1559 fee pair used for every submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePair {
    /// Tip paid to the block producer, in wei
    pub max_priority_fee_per_gas: u128,

    /// Absolute fee cap per gas, in wei
    pub max_fee_per_gas: u128,
}

/// Named durable queue of jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// Per-move and per-highscore-update submissions
    #[serde(rename = "transaction-processing")]
    TransactionProcessing,

    /// Consolidated score push
    #[serde(rename = "send-user-score")]
    SendUserScore,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::TransactionProcessing, Lane::SendUserScore];

    /// Queue name as seen in the coordination store
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::TransactionProcessing => "transaction-processing",
            Lane::SendUserScore => "send-user-score",
        }
    }

    /// Job name recorded on every envelope enqueued into this lane
    pub fn job_name(&self) -> &'static str {
        match self {
            Lane::TransactionProcessing => "process-transaction",
            Lane::SendUserScore => "send-user-score",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transaction-processing job asks the score manager to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum TxPayload {
    /// Push the player's highscore, recorded on the game-over record
    UpdateHighscoreTx { player_id: PlayerId },

    /// Store a single move, recorded on the move record
    PlayerMoveTx { player_move_id: PlayerMoveId },
}

/// Job data for the `transaction-processing` lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxJobData {
    pub chain_id: ChainId,
    pub player: Address,
    pub session_id: SessionId,
    pub payload: TxPayload,
}

/// Job data for the `send-user-score` lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendUserScoreJobData {
    pub chain_id: ChainId,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub player_address: Address,
    pub score_amount: u64,
    pub transaction_amount: u64,
}

/// Everything that can be enqueued; the variant decides the lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum JobPayload {
    Tx(TxJobData),
    SendUserScore(SendUserScoreJobData),
}

impl JobPayload {
    pub fn lane(&self) -> Lane {
        match self {
            JobPayload::Tx(_) => Lane::TransactionProcessing,
            JobPayload::SendUserScore(_) => Lane::SendUserScore,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        match self {
            JobPayload::Tx(data) => data.chain_id,
            JobPayload::SendUserScore(data) => data.chain_id,
        }
    }
}

impl From<TxJobData> for JobPayload {
    fn from(data: TxJobData) -> Self {
        JobPayload::Tx(data)
    }
}

impl From<SendUserScoreJobData> for JobPayload {
    fn from(data: SendUserScoreJobData) -> Self {
        JobPayload::SendUserScore(data)
    }
}

/// Milliseconds since the Unix epoch.
///
/// Anchored once to the wall clock and advanced with `tokio::time::Instant`,
/// so paused-time tests move queue schedules forward together with TTLs.
pub fn unix_millis() -> u64 {
    static ANCHOR: once_cell::sync::Lazy<(u64, tokio::time::Instant)> =
        once_cell::sync::Lazy::new(|| {
            let wall = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_millis() as u64;
            (wall, tokio::time::Instant::now())
        });

    let (wall, instant) = *ANCHOR;
    wall + instant.elapsed().as_millis() as u64
}
