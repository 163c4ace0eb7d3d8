//! Integration test for the durable job queue lanes

#[cfg(test)]
mod queue_lane_tests {
    use alloy::primitives::Address;
    use score_relayer::config::QueueConfig;
    use score_relayer::queue::{FailOutcome, JobOptions, JobQueue};
    use score_relayer::store::{CoordinationStore, MemoryStore};
    use score_relayer::types::{Lane, SendUserScoreJobData, TxJobData, TxPayload};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn queue() -> JobQueue {
        let config = QueueConfig {
            backoff_ms: 2_000,
            ..QueueConfig::default()
        };
        JobQueue::new(Arc::new(MemoryStore::new()), &config)
    }

    fn tx(player_move_id: i64) -> TxJobData {
        TxJobData {
            chain_id: 10143,
            player: Address::repeat_byte(0x01),
            session_id: 3,
            payload: TxPayload::PlayerMoveTx { player_move_id },
        }
    }

    fn score() -> SendUserScoreJobData {
        SendUserScoreJobData {
            chain_id: 10143,
            session_id: 3,
            player_id: 77,
            player_address: Address::repeat_byte(0x02),
            score_amount: 900,
            transaction_amount: 31,
        }
    }

    #[tokio::test]
    async fn test_lanes_are_independent() {
        let queue = queue();
        let tx_id = queue.add_job(tx(1), JobOptions::default()).await.unwrap();
        let score_id = queue.add_job(score(), JobOptions::default()).await.unwrap();

        // Ids are per-lane counters
        assert_eq!(tx_id, "1");
        assert_eq!(score_id, "1");

        let claimed = queue.claim(Lane::SendUserScore).await.unwrap().unwrap();
        assert_eq!(claimed.name, "send-user-score");
        assert!(queue.claim(Lane::SendUserScore).await.unwrap().is_none());

        let counts = queue.counts(Lane::TransactionProcessing).await.unwrap();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.active, 0);
    }

    #[tokio::test]
    async fn test_claims_are_fifo() {
        let queue = queue();
        for id in 1..=3 {
            queue.add_job(tx(id), JobOptions::default()).await.unwrap();
        }

        let mut order = Vec::new();
        while let Some(job) = queue.claim(Lane::TransactionProcessing).await.unwrap() {
            order.push(job.id.clone());
            queue.complete(&job).await.unwrap();
        }
        assert_eq!(order, vec!["1", "2", "3"]);
        assert_eq!(queue.counts(Lane::TransactionProcessing).await.unwrap().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_fixed_backoff_then_discard() {
        let queue = queue();
        let id = queue.add_job(tx(9), JobOptions::default()).await.unwrap();

        let job = queue.claim(Lane::TransactionProcessing).await.unwrap().unwrap();
        let outcome = queue.fail(&job, true, "rpc timeout").await.unwrap();
        assert_eq!(
            outcome,
            FailOutcome::Retrying {
                attempts_made: 1,
                retry_in: Duration::from_millis(2_000),
            }
        );
        assert!(queue.claim(Lane::TransactionProcessing).await.unwrap().is_none());

        tokio::time::advance(Duration::from_millis(2_001)).await;
        let job = queue.claim(Lane::TransactionProcessing).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, 1);
        assert_eq!(job.attempt(), 2);

        queue.fail(&job, true, "rpc timeout").await.unwrap();
        tokio::time::advance(Duration::from_millis(2_001)).await;
        let job = queue.claim(Lane::TransactionProcessing).await.unwrap().unwrap();

        // Third failure exhausts max_attempts = 3
        let outcome = queue.fail(&job, true, "rpc timeout").await.unwrap();
        assert_eq!(outcome, FailOutcome::Discarded { attempts_made: 3 });
        assert!(queue.get_job(Lane::TransactionProcessing, &id).await.unwrap().is_none());
        assert_eq!(queue.counts(Lane::TransactionProcessing).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_stalled_job_needs_two_sweeps() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone(), &QueueConfig::default());
        queue.add_job(tx(5), JobOptions::default()).await.unwrap();
        let job = queue.claim(Lane::TransactionProcessing).await.unwrap().unwrap();

        // The worker holding it died and its lease expired
        store
            .delete(&format!("queue:transaction-processing:lease:{}", job.id))
            .await
            .unwrap();

        let mut suspects = HashSet::new();
        assert_eq!(queue.recover_stalled(Lane::TransactionProcessing, &mut suspects).await.unwrap(), 0);
        assert_eq!(queue.recover_stalled(Lane::TransactionProcessing, &mut suspects).await.unwrap(), 1);

        let job = queue.claim(Lane::TransactionProcessing).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, 0);
    }
}
