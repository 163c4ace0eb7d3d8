//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Queue counters
    pub jobs_enqueued_total: IntCounter,
    pub jobs_completed_total: IntCounter,
    pub jobs_failed_attempts_total: IntCounter,
    pub jobs_discarded_total: IntCounter,
    pub jobs_recovered_stalled_total: IntCounter,

    // Nonce counters
    pub nonce_chain_resyncs_total: IntCounter,
    pub nonce_cache_evictions_total: IntCounter,
    pub nonce_lock_timeouts_total: IntCounter,

    // Fee cache / relayer counters
    pub fee_cache_hits_total: IntCounter,
    pub fee_cache_misses_total: IntCounter,
    pub relayer_selections_total: IntCounter,

    // Gauges
    pub jobs_in_flight: IntGauge,

    // Histograms
    pub job_duration: Histogram,
    pub nonce_lock_wait: Histogram,
    pub chain_submit: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let jobs_enqueued_total = IntCounter::with_opts(Opts::new(
            "jobs_enqueued_total",
            "Jobs added to either queue lane",
        ))?;

        let jobs_completed_total = IntCounter::with_opts(Opts::new(
            "jobs_completed_total",
            "Jobs whose handler finished successfully",
        ))?;

        let jobs_failed_attempts_total = IntCounter::with_opts(Opts::new(
            "jobs_failed_attempts_total",
            "Job attempts that ended in an error",
        ))?;

        let jobs_discarded_total = IntCounter::with_opts(Opts::new(
            "jobs_discarded_total",
            "Jobs dropped after exhausting attempts or failing permanently",
        ))?;

        let jobs_recovered_stalled_total = IntCounter::with_opts(Opts::new(
            "jobs_recovered_stalled_total",
            "Active jobs returned to the wait list after their worker lease expired",
        ))?;

        let nonce_chain_resyncs_total = IntCounter::with_opts(Opts::new(
            "nonce_chain_resyncs_total",
            "Nonce issuances that fell back to the chain transaction count",
        ))?;

        let nonce_cache_evictions_total = IntCounter::with_opts(Opts::new(
            "nonce_cache_evictions_total",
            "Cached nonce slots deleted after a nonce-too-low rejection",
        ))?;

        let nonce_lock_timeouts_total = IntCounter::with_opts(Opts::new(
            "nonce_lock_timeouts_total",
            "Nonce lock acquisitions that gave up after the poll window",
        ))?;

        let fee_cache_hits_total =
            IntCounter::with_opts(Opts::new("fee_cache_hits_total", "Fee pairs served from cache"))?;

        let fee_cache_misses_total = IntCounter::with_opts(Opts::new(
            "fee_cache_misses_total",
            "Fee pairs fetched from the chain",
        ))?;

        let relayer_selections_total = IntCounter::with_opts(Opts::new(
            "relayer_selections_total",
            "Relayer keys handed out by the pool",
        ))?;

        let jobs_in_flight = IntGauge::with_opts(Opts::new(
            "jobs_in_flight",
            "Job handlers currently executing",
        ))?;

        let job_duration = Histogram::with_opts(
            HistogramOpts::new("job_duration_seconds", "Job handler execution time")
                .buckets(vec![0.1, 0.5, 1.0, 3.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let nonce_lock_wait = Histogram::with_opts(
            HistogramOpts::new("nonce_lock_wait_seconds", "Time spent waiting for a nonce lock")
                .buckets(vec![0.001, 0.005, 0.02, 0.1, 0.5, 1.0, 5.0]),
        )?;

        let chain_submit = Histogram::with_opts(
            HistogramOpts::new("chain_submit_seconds", "Signed transaction submission latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(jobs_enqueued_total.clone()))?;
        registry.register(Box::new(jobs_completed_total.clone()))?;
        registry.register(Box::new(jobs_failed_attempts_total.clone()))?;
        registry.register(Box::new(jobs_discarded_total.clone()))?;
        registry.register(Box::new(jobs_recovered_stalled_total.clone()))?;
        registry.register(Box::new(nonce_chain_resyncs_total.clone()))?;
        registry.register(Box::new(nonce_cache_evictions_total.clone()))?;
        registry.register(Box::new(nonce_lock_timeouts_total.clone()))?;
        registry.register(Box::new(fee_cache_hits_total.clone()))?;
        registry.register(Box::new(fee_cache_misses_total.clone()))?;
        registry.register(Box::new(relayer_selections_total.clone()))?;
        registry.register(Box::new(jobs_in_flight.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;
        registry.register(Box::new(nonce_lock_wait.clone()))?;
        registry.register(Box::new(chain_submit.clone()))?;

        Ok(Self {
            registry,
            jobs_enqueued_total,
            jobs_completed_total,
            jobs_failed_attempts_total,
            jobs_discarded_total,
            jobs_recovered_stalled_total,
            nonce_chain_resyncs_total,
            nonce_cache_evictions_total,
            nonce_lock_timeouts_total,
            fee_cache_hits_total,
            fee_cache_misses_total,
            relayer_selections_total,
            jobs_in_flight,
            job_duration,
            nonce_lock_wait,
            chain_submit,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
