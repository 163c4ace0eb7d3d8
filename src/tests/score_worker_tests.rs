//! Score Submission Worker Tests

#[cfg(test)]
mod score_worker_tests {
    use crate::chain::ContractCall;
    use crate::relayer_pool::RelayerKey;
    use crate::structured_logging::JobLogger;
    use crate::tests::test_helpers::{game_over_key, harness, key_address, Harness, CHAIN_ID, PUBLISHER_KEY_INDEX};
    use crate::test_utils::{MockChain, ANVIL_PRIVATE_KEYS};
    use crate::types::{SendUserScoreJobData, TxJobData, TxPayload};
    use crate::worker::{JobError, JobHandler, JobOutcome, ScoreSubmissionHandler};
    use alloy::primitives::Address;

    fn handler(h: &Harness) -> ScoreSubmissionHandler {
        let publisher = RelayerKey::from_secret(ANVIL_PRIVATE_KEYS[PUBLISHER_KEY_INDEX]).unwrap();
        ScoreSubmissionHandler::new(publisher, h.ctx.records.clone(), h.ctx.submitter())
    }

    fn score(player_id: i64, session_id: u64) -> SendUserScoreJobData {
        SendUserScoreJobData {
            chain_id: CHAIN_ID,
            session_id,
            player_id,
            player_address: Address::repeat_byte(0xcc),
            score_amount: 1_250,
            transaction_amount: 17,
        }
    }

    /// Test: the publisher key pushes the consolidated score to the leaderboard
    #[tokio::test]
    async fn test_score_pushed_with_publisher_key() {
        let h = harness(2).await;
        let publisher = key_address(PUBLISHER_KEY_INDEX);
        h.chain.set_transaction_count(publisher, 21);
        let key = game_over_key(5, 2);
        h.records.insert_game_over(key);

        let job = h.enqueue_and_claim(score(5, 2)).await;
        let outcome = handler(&h).handle(&job, &JobLogger::new(&job)).await.unwrap();

        let expected = MockChain::expected_hash(CHAIN_ID, publisher, 21);
        assert_eq!(outcome, JobOutcome::Recorded(expected));

        let submissions = h.chain.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].from, publisher);
        assert_eq!(
            submissions[0].call,
            ContractCall::UpdatePlayerData {
                player: Address::repeat_byte(0xcc),
                score_amount: 1_250,
                transaction_amount: 17,
            }
        );

        let stored = h.records.game_over(&key).unwrap();
        assert_eq!(stored.score_tx_hash, Some(expected));
        assert_eq!(stored.highscore_tx_hash, None);

        // The relayer pool is not consulted
        let scores = h.ctx.relayers.usage_scores().await.unwrap();
        assert!(scores.iter().all(|(_, s)| *s == 0));
    }

    /// Test: consecutive scores use consecutive publisher nonces
    #[tokio::test]
    async fn test_publisher_nonces_are_sequential() {
        let h = harness(1).await;
        for session in 1..=3 {
            h.records.insert_game_over(game_over_key(5, session));
        }

        let handler = handler(&h);
        for session in 1..=3 {
            let job = h.enqueue_and_claim(score(5, session)).await;
            handler.handle(&job, &JobLogger::new(&job)).await.unwrap();
        }

        let nonces: Vec<u64> = h.chain.submissions().iter().map(|s| s.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    /// Test: an already pushed score completes without a second submission
    #[tokio::test]
    async fn test_score_redelivery_is_idempotent() {
        let h = harness(1).await;
        h.records.insert_game_over(game_over_key(5, 2));

        let handler = handler(&h);
        let job = h.enqueue_and_claim(score(5, 2)).await;
        let first = handler.handle(&job, &JobLogger::new(&job)).await.unwrap();
        let second = handler.handle(&job, &JobLogger::new(&job)).await.unwrap();

        assert_eq!(second, JobOutcome::AlreadyRecorded(first.tx_hash()));
        assert_eq!(h.chain.submissions().len(), 1);
    }

    /// Test: transaction payloads are refused by the score handler
    #[tokio::test]
    async fn test_transaction_payload_rejected() {
        let h = harness(1).await;
        let job = h
            .enqueue_and_claim(TxJobData {
                chain_id: CHAIN_ID,
                player: Address::ZERO,
                session_id: 1,
                payload: TxPayload::PlayerMoveTx { player_move_id: 1 },
            })
            .await;

        let err = handler(&h).handle(&job, &JobLogger::new(&job)).await.unwrap_err();
        assert!(matches!(err, JobError::Config(_)));
        assert!(!err.is_retryable());
    }
}
