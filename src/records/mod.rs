//! Record Store Module
//!
//! Keyed access to the two relational records the workers write back to:
//! the game-over record of a (player, chain, session) and a single player
//! move. Only the transaction-hash columns are touched here; the records
//! themselves are created upstream before jobs are enqueued.

use crate::types::{ChainId, PlayerId, PlayerMoveId, SessionId, TxHash};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory_records;
pub mod postgres_records;

pub use memory_records::MemoryRecordStore;
pub use postgres_records::PostgresRecordStore;

/// Unique identity of a game-over record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameOverKey {
    pub player_id: PlayerId,
    pub chain_id: ChainId,
    pub session_id: SessionId,
}

/// Hash columns of a game-over record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameOverField {
    /// Set by the highscore update submission
    HighscoreTxHash,
    /// Set by the consolidated score push
    ScoreTxHash,
}

impl GameOverField {
    pub fn column(&self) -> &'static str {
        match self {
            GameOverField::HighscoreTxHash => "highscoreTxHash",
            GameOverField::ScoreTxHash => "scoreTxHash",
        }
    }
}

/// Record store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record store backend error: {0}")]
    Backend(String),

    #[error("Stored transaction hash is malformed: {0}")]
    Corrupt(String),
}

impl RecordError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RecordError::Backend(_))
    }
}

impl From<tokio_postgres::Error> for RecordError {
    fn from(err: tokio_postgres::Error) -> Self {
        RecordError::Backend(err.to_string())
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Keyed reads and updates of transaction hashes
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn game_over_tx_hash(&self, key: GameOverKey, field: GameOverField) -> RecordResult<Option<TxHash>>;

    async fn set_game_over_tx_hash(
        &self,
        key: GameOverKey,
        field: GameOverField,
        hash: TxHash,
    ) -> RecordResult<()>;

    async fn player_move_tx_hash(&self, id: PlayerMoveId) -> RecordResult<Option<TxHash>>;

    async fn set_player_move_tx_hash(&self, id: PlayerMoveId, hash: TxHash) -> RecordResult<()>;
}
