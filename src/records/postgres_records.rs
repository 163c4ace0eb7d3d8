//! Postgres record store over the game's relational schema
//!
//! Tables and columns use the quoted camelCase names of the existing schema:
//! `"GameOverRecord"` (unique on `playerId, chainId, sessionId`) and
//! `"PlayerMove"`. Hashes are stored as 0x-prefixed hex text.

use super::{GameOverField, GameOverKey, RecordError, RecordResult, RecordStore};
use crate::types::{PlayerMoveId, TxHash};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

/// Record store backed by Postgres
#[derive(Clone)]
pub struct PostgresRecordStore {
    client: Arc<Client>,
}

impl std::fmt::Debug for PostgresRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRecordStore").finish_non_exhaustive()
    }
}

impl PostgresRecordStore {
    /// Connect and drive the connection on a background task
    pub async fn connect(database_url: &str) -> RecordResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Record store connection closed with error");
            }
        });
        info!("Connected to record store");
        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn parse_hash(raw: Option<String>) -> RecordResult<Option<TxHash>> {
        raw.filter(|s| !s.is_empty())
            .map(|s| TxHash::from_str(&s).map_err(|_| RecordError::Corrupt(s)))
            .transpose()
    }

    fn game_over_select(field: GameOverField) -> String {
        format!(
            r#"SELECT "{}" FROM "GameOverRecord" WHERE "playerId" = $1::bigint AND "chainId" = $2::bigint AND "sessionId" = $3::bigint"#,
            field.column()
        )
    }

    fn game_over_update(field: GameOverField) -> String {
        format!(
            r#"UPDATE "GameOverRecord" SET "{}" = $4 WHERE "playerId" = $1::bigint AND "chainId" = $2::bigint AND "sessionId" = $3::bigint"#,
            field.column()
        )
    }
}

fn key_params(key: &GameOverKey) -> (i64, i64, i64) {
    (key.player_id, key.chain_id as i64, key.session_id as i64)
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn game_over_tx_hash(&self, key: GameOverKey, field: GameOverField) -> RecordResult<Option<TxHash>> {
        let (player_id, chain_id, session_id) = key_params(&key);
        let row = self
            .client
            .query_opt(&Self::game_over_select(field), &[&player_id, &chain_id, &session_id])
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("game over {:?}", key)))?;
        Self::parse_hash(row.try_get(0)?)
    }

    async fn set_game_over_tx_hash(
        &self,
        key: GameOverKey,
        field: GameOverField,
        hash: TxHash,
    ) -> RecordResult<()> {
        let (player_id, chain_id, session_id) = key_params(&key);
        let hash = hash.to_string();
        let updated = self
            .client
            .execute(
                &Self::game_over_update(field),
                &[&player_id, &chain_id, &session_id, &hash],
            )
            .await?;
        if updated == 0 {
            return Err(RecordError::NotFound(format!("game over {:?}", key)));
        }
        Ok(())
    }

    async fn player_move_tx_hash(&self, id: PlayerMoveId) -> RecordResult<Option<TxHash>> {
        let row = self
            .client
            .query_opt(r#"SELECT "txHash" FROM "PlayerMove" WHERE "id" = $1::bigint"#, &[&id])
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("player move {}", id)))?;
        Self::parse_hash(row.try_get(0)?)
    }

    async fn set_player_move_tx_hash(&self, id: PlayerMoveId, hash: TxHash) -> RecordResult<()> {
        let hash = hash.to_string();
        let updated = self
            .client
            .execute(
                r#"UPDATE "PlayerMove" SET "txHash" = $2 WHERE "id" = $1::bigint"#,
                &[&id, &hash],
            )
            .await?;
        if updated == 0 {
            return Err(RecordError::NotFound(format!("player move {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    #[test]
    fn test_statements_target_requested_column() {
        let select = PostgresRecordStore::game_over_select(GameOverField::HighscoreTxHash);
        assert!(select.starts_with(r#"SELECT "highscoreTxHash" FROM "GameOverRecord""#));

        let update = PostgresRecordStore::game_over_update(GameOverField::ScoreTxHash);
        assert!(update.contains(r#"SET "scoreTxHash" = $4"#));
    }

    #[test]
    fn test_parse_hash() {
        let hash = B256::repeat_byte(0xab);
        assert_eq!(
            PostgresRecordStore::parse_hash(Some(hash.to_string())).unwrap(),
            Some(hash)
        );
        assert_eq!(PostgresRecordStore::parse_hash(None).unwrap(), None);
        assert_eq!(PostgresRecordStore::parse_hash(Some(String::new())).unwrap(), None);
        assert!(matches!(
            PostgresRecordStore::parse_hash(Some("0x12".to_string())),
            Err(RecordError::Corrupt(_))
        ));
    }
}
