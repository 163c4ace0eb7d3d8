//! In-process record store for single-node runs and tests

use super::{GameOverField, GameOverKey, RecordError, RecordResult, RecordStore};
use crate::types::{PlayerMoveId, TxHash};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameOverHashes {
    pub highscore_tx_hash: Option<TxHash>,
    pub score_tx_hash: Option<TxHash>,
}

impl GameOverHashes {
    fn field_mut(&mut self, field: GameOverField) -> &mut Option<TxHash> {
        match field {
            GameOverField::HighscoreTxHash => &mut self.highscore_tx_hash,
            GameOverField::ScoreTxHash => &mut self.score_tx_hash,
        }
    }

    fn field(&self, field: GameOverField) -> Option<TxHash> {
        match field {
            GameOverField::HighscoreTxHash => self.highscore_tx_hash,
            GameOverField::ScoreTxHash => self.score_tx_hash,
        }
    }
}

/// Record store kept in memory
///
/// Like the relational store, updates only succeed on records that already
/// exist; use `insert_*` to create them.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    game_overs: DashMap<GameOverKey, GameOverHashes>,
    player_moves: DashMap<PlayerMoveId, Option<TxHash>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_game_over(&self, key: GameOverKey) {
        self.game_overs.entry(key).or_default();
    }

    pub fn insert_player_move(&self, id: PlayerMoveId) {
        self.player_moves.entry(id).or_insert(None);
    }

    pub fn game_over(&self, key: &GameOverKey) -> Option<GameOverHashes> {
        self.game_overs.get(key).map(|r| *r)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn game_over_tx_hash(&self, key: GameOverKey, field: GameOverField) -> RecordResult<Option<TxHash>> {
        self.game_overs
            .get(&key)
            .map(|r| r.field(field))
            .ok_or_else(|| RecordError::NotFound(format!("game over {:?}", key)))
    }

    async fn set_game_over_tx_hash(
        &self,
        key: GameOverKey,
        field: GameOverField,
        hash: TxHash,
    ) -> RecordResult<()> {
        let mut record = self
            .game_overs
            .get_mut(&key)
            .ok_or_else(|| RecordError::NotFound(format!("game over {:?}", key)))?;
        *record.field_mut(field) = Some(hash);
        Ok(())
    }

    async fn player_move_tx_hash(&self, id: PlayerMoveId) -> RecordResult<Option<TxHash>> {
        self.player_moves
            .get(&id)
            .map(|r| *r)
            .ok_or_else(|| RecordError::NotFound(format!("player move {}", id)))
    }

    async fn set_player_move_tx_hash(&self, id: PlayerMoveId, hash: TxHash) -> RecordResult<()> {
        let mut record = self
            .player_moves
            .get_mut(&id)
            .ok_or_else(|| RecordError::NotFound(format!("player move {}", id)))?;
        *record = Some(hash);
        Ok(())
    }
}
