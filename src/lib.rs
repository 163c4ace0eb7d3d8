//! Score Relayer Library
//!
//! Relays game events to on-chain score contracts through a pool of
//! fee-paying relayer keys. Jobs arrive on two durable queue lanes; the
//! workers coordinate nonces and fee estimates through a shared store so any
//! number of processes can submit for the same relayer keys.

pub mod chain;
pub mod config;
pub mod context;
pub mod endpoints;
pub mod gas;
pub mod metrics;
pub mod nonce;
pub mod queue;
pub mod records;
pub mod relayer_pool;
pub mod store;
pub mod structured_logging;
pub mod types;
pub mod worker;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use context::ServiceContext;
pub use queue::{JobOptions, JobQueue};
pub use types::{JobPayload, Lane, SendUserScoreJobData, TxJobData, TxPayload};

#[cfg(test)]
mod tests {
    mod nonce_concurrency_tests;
    mod score_worker_tests;
    mod test_helpers;
    mod tx_worker_tests;
    mod worker_runtime_tests;
}
