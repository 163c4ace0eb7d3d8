//! Worker runtime: claims jobs from one lane and runs them with bounded concurrency
//!
//! Each claimed job runs on its own task holding a semaphore permit. While a
//! handler runs, its queue lease is renewed so the stalled sweep leaves it
//! alone. On shutdown the loop stops claiming and waits until every permit is
//! back, i.e. all in-flight jobs have been acked or failed.

use super::submission::JobState;
use super::worker_errors::JobError;
use crate::metrics::{metrics, Timer};
use crate::queue::{Job, JobQueue};
use crate::structured_logging::JobLogger;
use crate::types::{Lane, TxHash};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Successful end of a job attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Submitted and recorded in this attempt
    Recorded(TxHash),
    /// A previous delivery already recorded this hash
    AlreadyRecorded(TxHash),
}

impl JobOutcome {
    pub fn tx_hash(&self) -> TxHash {
        match self {
            JobOutcome::Recorded(hash) | JobOutcome::AlreadyRecorded(hash) => *hash,
        }
    }
}

/// Processes one job attempt
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job, log: &JobLogger) -> Result<JobOutcome, JobError>;
}

/// Consumer of one lane
pub struct Worker {
    lane: Lane,
    concurrency: usize,
    handler: Arc<dyn JobHandler>,
    queue: JobQueue,
    poll_interval: Duration,
    stalled_check_interval: Duration,
}

impl Worker {
    pub fn new(lane: Lane, concurrency: usize, handler: Arc<dyn JobHandler>, queue: JobQueue) -> Self {
        Self {
            lane,
            concurrency: concurrency.max(1),
            handler,
            queue,
            poll_interval: Duration::from_millis(50),
            stalled_check_interval: Duration::from_secs(15),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stalled_check_interval(mut self, interval: Duration) -> Self {
        self.stalled_check_interval = interval;
        self
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Run until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut suspects = HashSet::new();
        let mut last_sweep = Instant::now();

        info!(lane = %self.lane, concurrency = self.concurrency, "Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_sweep.elapsed() >= self.stalled_check_interval {
                if let Err(e) = self.queue.recover_stalled(self.lane, &mut suspects).await {
                    warn!(lane = %self.lane, error = %e, "Stalled job sweep failed");
                }
                last_sweep = Instant::now();
            }

            let permit = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.queue.claim(self.lane).await {
                Ok(Some(job)) => {
                    tokio::spawn(execute(
                        self.handler.clone(),
                        self.queue.clone(),
                        job,
                        permit,
                    ));
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    error!(lane = %self.lane, error = %e, "Failed to claim job");
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(lane = %self.lane, "Worker stopping, waiting for in-flight jobs");
        let _drained = semaphore.acquire_many(self.concurrency as u32).await;
        info!(lane = %self.lane, "Worker stopped");
    }
}

/// Run one job attempt and settle it with the queue
async fn execute(handler: Arc<dyn JobHandler>, queue: JobQueue, job: Job, permit: OwnedSemaphorePermit) {
    let log = JobLogger::new(&job);
    log.log_transition(JobState::Dequeued);

    metrics().jobs_in_flight.inc();
    let timer = Timer::new();

    let result = {
        let handled = handler.handle(&job, &log);
        tokio::pin!(handled);
        let mut renew = tokio::time::interval((queue.lease_ttl() / 3).max(Duration::from_millis(1)));
        renew.tick().await;
        loop {
            tokio::select! {
                result = &mut handled => break result,
                _ = renew.tick() => {
                    if let Err(e) = queue.renew_lease(&job).await {
                        log.warn(&format!("failed to renew job lease: {}", e));
                    }
                }
            }
        }
    };

    timer.observe_duration(&metrics().job_duration);
    metrics().jobs_in_flight.dec();

    match result {
        Ok(outcome) => {
            if let Err(e) = queue.complete(&job).await {
                log.warn(&format!("failed to acknowledge job: {}", e));
            }
            log.log_recorded(outcome.tx_hash(), (timer.elapsed_secs() * 1000.0) as u64);
        }
        Err(err) => {
            let reason = err.to_string();
            match queue.fail(&job, err.is_retryable(), &reason).await {
                Ok(outcome) => log.log_failure(&reason, outcome),
                Err(e) => log.warn(&format!("failed to record job failure ({}): {}", reason, e)),
            }
        }
    }

    drop(permit);
}
