//! Durable two-lane job queue on top of the coordination store
//!
//! Per lane `L` the store holds:
//! - `queue:L:id`         job id counter
//! - `queue:L:job:<id>`   JSON envelope
//! - `queue:L:wait`       ids ready to run (list, FIFO)
//! - `queue:L:delayed`    ids scored by the unix-ms time they become ready
//! - `queue:L:active`     ids claimed by a worker
//! - `queue:L:lease:<id>` TTL key renewed by the worker running the job
//!
//! Delivery is at-least-once: an active job whose lease is gone on two
//! consecutive stalled sweeps goes back to `wait`.

use super::job::{Job, JobOptions};
use super::queue_errors::{QueueError, QueueResult};
use crate::config::QueueConfig;
use crate::metrics::metrics;
use crate::store::CoordinationStore;
use crate::types::{unix_millis, JobPayload, Lane};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How many due delayed jobs are promoted per claim
const PROMOTE_BATCH: usize = 100;

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Rescheduled; `attempts_made` is the number of attempts used so far
    Retrying { attempts_made: u32, retry_in: Duration },
    /// Dropped from the lane
    Discarded { attempts_made: u32 },
}

/// Jobs per state in one lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneCounts {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
}

impl LaneCounts {
    pub fn total(&self) -> usize {
        self.waiting + self.delayed + self.active
    }
}

/// Store keys of one lane
#[derive(Debug, Clone)]
struct LaneKeys {
    prefix: String,
}

impl LaneKeys {
    fn new(lane: Lane) -> Self {
        Self {
            prefix: format!("queue:{}", lane.as_str()),
        }
    }

    fn id(&self) -> String {
        format!("{}:id", self.prefix)
    }

    fn job(&self, id: &str) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn wait(&self) -> String {
        format!("{}:wait", self.prefix)
    }

    fn delayed(&self) -> String {
        format!("{}:delayed", self.prefix)
    }

    fn active(&self) -> String {
        format!("{}:active", self.prefix)
    }

    fn lease(&self, id: &str) -> String {
        format!("{}:lease:{}", self.prefix, id)
    }
}

/// Producer and consumer handle for both lanes
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Arc<dyn CoordinationStore>,
    max_attempts: u32,
    backoff: Duration,
    lease_ttl: Duration,
}

impl JobQueue {
    pub fn new(store: Arc<dyn CoordinationStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts,
            backoff: config.backoff(),
            lease_ttl: config.lease_ttl(),
        }
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    /// Enqueue `payload` on the lane its variant belongs to, returning the job id
    pub async fn add_job(&self, payload: impl Into<JobPayload>, options: JobOptions) -> QueueResult<String> {
        let data = payload.into();
        let lane = data.lane();
        let keys = LaneKeys::new(lane);

        let id = self.store.incr(&keys.id()).await?.to_string();
        let now = unix_millis();
        let delay_ms = options.delay.as_millis() as u64;
        let job = Job {
            id: id.clone(),
            lane,
            name: lane.job_name().to_string(),
            data,
            attempts_made: 0,
            max_attempts: self.max_attempts,
            backoff_ms: self.backoff.as_millis() as u64,
            delay_ms,
            created_at_ms: now,
        };

        self.write_envelope(&keys, &job).await?;
        if delay_ms == 0 {
            self.store.lpush(&keys.wait(), &id).await?;
        } else {
            self.store
                .zadd(&keys.delayed(), &[(id.clone(), (now + delay_ms) as f64)])
                .await?;
        }

        metrics().jobs_enqueued_total.inc();
        debug!(
            job_id = %id,
            lane = %lane,
            chain_id = job.data.chain_id(),
            delay_ms = delay_ms,
            "Job enqueued"
        );
        Ok(id)
    }

    /// Move due delayed jobs to `wait`; returns how many were promoted
    pub async fn promote_delayed(&self, lane: Lane) -> QueueResult<usize> {
        let keys = LaneKeys::new(lane);
        let due = self
            .store
            .zrange_by_score(&keys.delayed(), unix_millis() as f64, PROMOTE_BATCH)
            .await?;

        let mut promoted = 0;
        for id in due {
            // Only the caller whose remove succeeds pushes the id
            if self.store.zrem(&keys.delayed(), &id).await? {
                self.store.lpush(&keys.wait(), &id).await?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Claim the oldest ready job of `lane`, if any
    pub async fn claim(&self, lane: Lane) -> QueueResult<Option<Job>> {
        let keys = LaneKeys::new(lane);
        self.promote_delayed(lane).await?;

        loop {
            let Some(id) = self.store.lmove(&keys.wait(), &keys.active()).await? else {
                return Ok(None);
            };
            self.store
                .set_with_ttl(&keys.lease(&id), "1", self.lease_ttl)
                .await?;

            match self.read_envelope(&keys, &id).await {
                Ok(Some(job)) => return Ok(Some(job)),
                Ok(None) => {
                    warn!(job_id = %id, lane = %lane, "Claimed id has no envelope, dropping");
                }
                Err(e) => {
                    error!(job_id = %id, lane = %lane, error = %e, "Dropping unreadable job");
                    self.store.delete(&keys.job(&id)).await?;
                    metrics().jobs_discarded_total.inc();
                }
            }
            self.store.lrem(&keys.active(), &id).await?;
            self.store.delete(&keys.lease(&id)).await?;
        }
    }

    /// Keep the lease of a running job alive
    pub async fn renew_lease(&self, job: &Job) -> QueueResult<()> {
        let keys = LaneKeys::new(job.lane);
        self.store
            .set_with_ttl(&keys.lease(&job.id), "1", self.lease_ttl)
            .await?;
        Ok(())
    }

    /// Acknowledge a successful job and remove it from the lane
    pub async fn complete(&self, job: &Job) -> QueueResult<()> {
        let keys = LaneKeys::new(job.lane);
        self.store.lrem(&keys.active(), &job.id).await?;
        self.store.delete(&keys.job(&job.id)).await?;
        self.store.delete(&keys.lease(&job.id)).await?;
        metrics().jobs_completed_total.inc();
        Ok(())
    }

    /// Record a failed attempt; retries after the fixed backoff while attempts remain
    pub async fn fail(&self, job: &Job, retryable: bool, reason: &str) -> QueueResult<FailOutcome> {
        let keys = LaneKeys::new(job.lane);
        let mut updated = job.clone();
        updated.attempts_made += 1;
        metrics().jobs_failed_attempts_total.inc();

        let outcome = if retryable && updated.attempts_made < updated.max_attempts {
            let retry_in = Duration::from_millis(updated.backoff_ms);
            self.write_envelope(&keys, &updated).await?;
            let moved = self
                .store
                .lrem_zadd(
                    &keys.active(),
                    &keys.delayed(),
                    &updated.id,
                    (unix_millis() + updated.backoff_ms) as f64,
                )
                .await?;
            if !moved {
                warn!(
                    job_id = %updated.id,
                    lane = %updated.lane,
                    "Failed job was no longer active, leaving it where the stalled sweep put it"
                );
            }
            FailOutcome::Retrying {
                attempts_made: updated.attempts_made,
                retry_in,
            }
        } else {
            self.store.lrem(&keys.active(), &updated.id).await?;
            self.store.delete(&keys.job(&updated.id)).await?;
            metrics().jobs_discarded_total.inc();
            error!(
                job_id = %updated.id,
                lane = %updated.lane,
                chain_id = updated.data.chain_id(),
                attempts_made = updated.attempts_made,
                retryable = retryable,
                reason = %reason,
                "Job discarded"
            );
            FailOutcome::Discarded {
                attempts_made: updated.attempts_made,
            }
        };

        self.store.delete(&keys.lease(&updated.id)).await?;
        Ok(outcome)
    }

    /// Return active jobs whose lease was missing on this and the previous sweep.
    ///
    /// `suspects` carries the lease-less ids between sweeps and is owned by the
    /// caller (one set per lane).
    pub async fn recover_stalled(&self, lane: Lane, suspects: &mut HashSet<String>) -> QueueResult<usize> {
        let keys = LaneKeys::new(lane);
        let active = self.store.lrange(&keys.active()).await?;
        let mut next_suspects = HashSet::new();
        let mut recovered = 0;

        for id in active {
            if self.store.exists(&keys.lease(&id)).await? {
                continue;
            }
            if suspects.contains(&id) {
                if self.store.lrem(&keys.active(), &id).await? > 0 {
                    self.store.lpush(&keys.wait(), &id).await?;
                    recovered += 1;
                    metrics().jobs_recovered_stalled_total.inc();
                    warn!(job_id = %id, lane = %lane, "Stalled job moved back to wait");
                }
            } else {
                next_suspects.insert(id);
            }
        }

        *suspects = next_suspects;
        if recovered > 0 {
            info!(lane = %lane, recovered = recovered, "Stalled job sweep finished");
        }
        Ok(recovered)
    }

    pub async fn counts(&self, lane: Lane) -> QueueResult<LaneCounts> {
        let keys = LaneKeys::new(lane);
        Ok(LaneCounts {
            waiting: self.store.llen(&keys.wait()).await?,
            delayed: self.store.zcard(&keys.delayed()).await?,
            active: self.store.llen(&keys.active()).await?,
        })
    }

    /// Load a job envelope by id
    pub async fn get_job(&self, lane: Lane, id: &str) -> QueueResult<Option<Job>> {
        self.read_envelope(&LaneKeys::new(lane), id).await
    }

    async fn write_envelope(&self, keys: &LaneKeys, job: &Job) -> QueueResult<()> {
        let raw = serde_json::to_string(job).map_err(|e| QueueError::Envelope {
            id: job.id.clone(),
            message: e.to_string(),
        })?;
        self.store.set(&keys.job(&job.id), &raw).await?;
        Ok(())
    }

    async fn read_envelope(&self, keys: &LaneKeys, id: &str) -> QueueResult<Option<Job>> {
        let Some(raw) = self.store.get(&keys.job(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| QueueError::Envelope {
                id: id.to_string(),
                message: e.to_string(),
            })
    }
}
