//! Metrics for caption queue monitoring.
//!
//! Two layers live here. [`MetricsSink`] is the outbound seam every worker
//! reports each provider attempt to, plus the dedicated quota-exhaustion
//! alert. [`QueueMetrics`] records queue-level counters and gauges through
//! the `metrics` facade; whichever recorder the host installs (the server
//! binary installs the Prometheus exporter) picks them up.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;
use tracing::warn;

/// Metric names for the caption queue.
pub mod names {
    /// Total jobs accepted by `submit`.
    pub const JOBS_SUBMITTED_TOTAL: &str = "caption_jobs_submitted_total";
    /// Total submissions rejected.
    pub const JOBS_REJECTED_TOTAL: &str = "caption_jobs_rejected_total";
    /// Total jobs handed to a worker.
    pub const JOBS_DISPATCHED_TOTAL: &str = "caption_jobs_dispatched_total";
    /// Total jobs reinserted for another attempt.
    pub const JOBS_RETRIED_TOTAL: &str = "caption_jobs_retried_total";
    /// Total jobs discarded without a successful caption.
    pub const JOBS_DROPPED_TOTAL: &str = "caption_jobs_dropped_total";

    /// Total provider attempts, by status.
    pub const PROVIDER_CALLS_TOTAL: &str = "caption_provider_calls_total";
    /// Provider call duration in seconds.
    pub const PROVIDER_DURATION_SECONDS: &str = "caption_provider_duration_seconds";
    /// Total quota-exhaustion alerts raised.
    pub const QUOTA_ALERTS_TOTAL: &str = "caption_provider_quota_alerts_total";

    /// Time a job waited in the store before dispatch, in seconds.
    pub const JOB_WAIT_TIME_SECONDS: &str = "caption_job_wait_time_seconds";
    /// Current waiting jobs.
    pub const QUEUE_LENGTH: &str = "caption_queue_length";
    /// Current in-flight jobs.
    pub const JOBS_IN_FLIGHT: &str = "caption_jobs_in_flight";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_SUBMITTED_TOTAL, "Total number of caption jobs accepted");
    describe_counter!(names::JOBS_REJECTED_TOTAL, "Total number of caption submissions rejected");
    describe_counter!(names::JOBS_DISPATCHED_TOTAL, "Total number of caption jobs dispatched");
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of caption job retries");
    describe_counter!(names::JOBS_DROPPED_TOTAL, "Total number of caption jobs dropped");

    describe_counter!(names::PROVIDER_CALLS_TOTAL, "Total number of caption provider calls");
    describe_histogram!(
        names::PROVIDER_DURATION_SECONDS,
        "Caption provider call duration in seconds"
    );
    describe_counter!(names::QUOTA_ALERTS_TOTAL, "Total number of provider quota alerts");

    describe_histogram!(
        names::JOB_WAIT_TIME_SECONDS,
        "Caption job wait time (time in queue) in seconds"
    );
    describe_gauge!(names::QUEUE_LENGTH, "Current number of waiting caption jobs");
    describe_gauge!(names::JOBS_IN_FLIGHT, "Current number of in-flight caption jobs");
}

/// One provider attempt as reported to a [`MetricsSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// Operation name.
    pub operation: String,
    /// Elapsed time of the attempt.
    pub duration: Duration,
    /// 200 on success, otherwise the provider error's status.
    pub status_code: u16,
    /// Requester identity, when known.
    pub requester_id: Option<String>,
    /// Error message of a failed attempt.
    pub error_message: Option<String>,
}

impl OperationRecord {
    /// Returns true for a successful attempt.
    pub fn is_success(&self) -> bool {
        self.status_code < 400 && self.error_message.is_none()
    }

    /// Elapsed time in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Outbound metrics and alerting seam.
///
/// Calls are fire-and-forget: implementations must swallow their own
/// failures and must not block.
pub trait MetricsSink: Send + Sync {
    /// Record one provider attempt.
    fn record(&self, record: &OperationRecord);

    /// Raise the dedicated quota-exhaustion alert.
    fn alert_quota_exhausted(&self, operation: &str, error_message: &str);
}

/// Sink that forwards attempts to the `metrics` facade and alerts to logs.
#[derive(Debug, Clone, Default)]
pub struct FacadeMetricsSink;

impl MetricsSink for FacadeMetricsSink {
    fn record(&self, record: &OperationRecord) {
        let status = if record.is_success() { "success" } else { "failure" };
        counter!(
            names::PROVIDER_CALLS_TOTAL,
            "operation" => record.operation.clone(),
            "status" => status,
            "status_code" => record.status_code.to_string()
        )
        .increment(1);

        histogram!(
            names::PROVIDER_DURATION_SECONDS,
            "operation" => record.operation.clone(),
            "status" => status
        )
        .record(record.duration.as_secs_f64());
    }

    fn alert_quota_exhausted(&self, operation: &str, error_message: &str) {
        counter!(names::QUOTA_ALERTS_TOTAL, "operation" => operation.to_string()).increment(1);
        warn!(operation, error = error_message, "Caption provider quota exhausted");
    }
}

/// Queue-level metrics recorder.
#[derive(Clone)]
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record an accepted submission.
    pub fn job_submitted(priority: &str) {
        counter!(names::JOBS_SUBMITTED_TOTAL, "priority" => priority.to_string()).increment(1);
    }

    /// Record a rejected submission.
    pub fn job_rejected(reason: &str) {
        counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason.to_string()).increment(1);
    }

    /// Record a dispatch and the time the job waited.
    pub fn job_dispatched(priority: &str, wait_time: Duration) {
        counter!(names::JOBS_DISPATCHED_TOTAL, "priority" => priority.to_string()).increment(1);
        histogram!(names::JOB_WAIT_TIME_SECONDS, "priority" => priority.to_string())
            .record(wait_time.as_secs_f64());
    }

    /// Record a retry reinsertion.
    pub fn job_retried(retry_count: u32) {
        counter!(names::JOBS_RETRIED_TOTAL, "retry_count" => retry_count.to_string()).increment(1);
    }

    /// Record jobs discarded for the given reason.
    pub fn jobs_dropped(reason: &str, count: u64) {
        counter!(names::JOBS_DROPPED_TOTAL, "reason" => reason.to_string()).increment(count);
    }

    /// Update queue size gauges.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_sizes(queue_length: usize, in_flight: usize) {
        gauge!(names::QUEUE_LENGTH).set(queue_length as f64);
        gauge!(names::JOBS_IN_FLIGHT).set(in_flight as f64);
    }
}
