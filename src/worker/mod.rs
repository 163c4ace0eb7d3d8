//! Worker Module
//!
//! Lane consumers and the two submission handlers built on a shared
//! relayer -> nonce -> fee -> submit -> record state machine.

pub mod runtime;
pub mod score_worker;
pub mod submission;
pub mod tx_worker;
pub mod worker_errors;

pub use runtime::{JobHandler, JobOutcome, Worker};
pub use score_worker::ScoreSubmissionHandler;
pub use submission::{JobState, Submitter};
pub use tx_worker::TxSubmissionHandler;
pub use worker_errors::JobError;
