//! Job Queue Module
//!
//! Two durable lanes (`transaction-processing`, `send-user-score`) with a
//! fixed retry policy, optional enqueue delay and stalled-job recovery.

pub mod job;
pub mod job_queue;
pub mod queue_errors;

pub use job::{Job, JobOptions};
pub use job_queue::{FailOutcome, JobQueue, LaneCounts};
pub use queue_errors::{QueueError, QueueResult};
