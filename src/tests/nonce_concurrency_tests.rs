//! Concurrency Tests for Nonce Coordination
//!
//! Two independent service contexts share one coordination store and one
//! chain, the way two relayer processes share Redis and a node:
//! - concurrent submissions for the same relayer never reuse a nonce
//! - the chain never sees a nonce-too-low rejection
//! - issued nonces are contiguous from the chain's pending count

#[cfg(test)]
mod nonce_concurrency_tests {
    use crate::chain::{ChainClients, ChainRegistry};
    use crate::context::ServiceContext;
    use crate::records::MemoryRecordStore;
    use crate::store::MemoryStore;
    use crate::structured_logging::JobLogger;
    use crate::tests::test_helpers::{key_address, test_config, CHAIN_ID};
    use crate::test_utils::MockChain;
    use crate::types::{Lane, TxJobData, TxPayload};
    use crate::worker::{JobHandler, TxSubmissionHandler};
    use alloy::primitives::Address;
    use std::collections::HashSet;
    use std::sync::Arc;

    const JOBS_PER_PROCESS: i64 = 15;

    /// Test: two processes submitting for one relayer stay in nonce order
    ///
    /// Requirements:
    /// - 30 parallel submissions across two contexts
    /// - every nonce in 3..33 used exactly once
    /// - exactly one chain read for the shared relayer
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_relayer_across_processes() {
        let store = Arc::new(MemoryStore::new());
        let chain = Arc::new(MockChain::new(CHAIN_ID));
        let records = Arc::new(MemoryRecordStore::new());
        let relayer = key_address(0);
        chain.set_transaction_count(relayer, 3);

        let mut handlers = Vec::new();
        for _ in 0..2 {
            let mut registry = ChainRegistry::new();
            registry.insert(CHAIN_ID, ChainClients::from_shared(chain.clone()));
            let ctx = ServiceContext::from_parts(
                test_config(1),
                store.clone(),
                Arc::new(registry),
                records.clone(),
            );
            ctx.reconcile_relayers().await.unwrap();
            handlers.push(Arc::new(TxSubmissionHandler::new(
                ctx.relayers.clone(),
                ctx.records.clone(),
                ctx.submitter(),
            )));
        }

        let total = JOBS_PER_PROCESS * 2;
        for id in 0..total {
            records.insert_player_move(id);
        }

        // Jobs are enqueued on the first context's queue and claimed up front
        let producer = ServiceContext::from_parts(
            test_config(1),
            store.clone(),
            Arc::new(ChainRegistry::new()),
            records.clone(),
        );
        let mut jobs = Vec::new();
        for id in 0..total {
            producer
                .queue
                .add_job(
                    TxJobData {
                        chain_id: CHAIN_ID,
                        player: Address::repeat_byte(0x11),
                        session_id: 1,
                        payload: TxPayload::PlayerMoveTx { player_move_id: id },
                    },
                    Default::default(),
                )
                .await
                .unwrap();
            jobs.push(
                producer
                    .queue
                    .claim(Lane::TransactionProcessing)
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }

        let mut tasks = Vec::new();
        for (i, job) in jobs.into_iter().enumerate() {
            let handler = handlers[i % 2].clone();
            tasks.push(tokio::spawn(async move {
                let log = JobLogger::new(&job);
                handler.handle(&job, &log).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let nonces: HashSet<u64> = chain.submissions().iter().map(|s| s.nonce).collect();
        assert_eq!(chain.submissions().len(), total as usize);
        assert_eq!(nonces, (3..3 + total as u64).collect::<HashSet<_>>());
        assert_eq!(chain.transaction_count_queries(), 1);
    }
}
