//! Single caption attempt against the provider.

use crate::error::ProviderError;
use crate::job::CaptionJob;
use crate::metrics::{MetricsSink, OperationRecord};
use crate::provider::CaptionProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Operation name reported to the metrics sink.
pub const OPERATION: &str = "generate_caption";

/// Executes caption jobs and reports every attempt.
///
/// A worker owns no bookkeeping; the queue decides what happens after a
/// failed attempt.
#[derive(Clone)]
pub struct Worker {
    provider: Arc<dyn CaptionProvider>,
    sink: Arc<dyn MetricsSink>,
    call_timeout: Duration,
}

impl Worker {
    /// Create a worker.
    pub fn new(
        provider: Arc<dyn CaptionProvider>,
        sink: Arc<dyn MetricsSink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            sink,
            call_timeout,
        }
    }

    /// Time budget for one attempt: the configured bound, cut to what is
    /// left of the job's deadline.
    ///
    /// Zero for a job dispatched exactly at its deadline. Such an attempt
    /// only succeeds if the provider answers on its first poll; otherwise
    /// it fails as a timeout, and its retry is dropped as expired at the
    /// next dispatch.
    pub fn budget(&self, job: &CaptionJob, now: Instant) -> Duration {
        self.call_timeout.min(job.remaining(now))
    }

    /// Run one attempt and report it to the sink.
    ///
    /// The caption is returned to the caller but never stored.
    pub async fn execute(&self, job: &CaptionJob) -> Result<String, ProviderError> {
        let started = Instant::now();
        let budget = self.budget(job, started);

        debug!(
            provider = self.provider.name(),
            retry_count = job.retry_count(),
            budget_ms = duration_ms(budget),
            "Calling caption provider"
        );

        let result = match timeout(budget, self.provider.generate(job.image_reference(), job.mood()))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(duration_ms(budget))),
        };
        let elapsed = started.elapsed();

        let record = OperationRecord {
            operation: OPERATION.to_string(),
            duration: elapsed,
            status_code: result.as_ref().map_or_else(ProviderError::status_code, |_| 200),
            requester_id: job.requester_id().map(str::to_string),
            error_message: result.as_ref().err().map(ToString::to_string),
        };
        self.sink.record(&record);

        match &result {
            Ok(caption) => {
                info!(
                    duration_ms = record.duration_ms(),
                    caption_len = caption.len(),
                    "Caption generated"
                );
            }
            Err(e) => {
                warn!(
                    duration_ms = record.duration_ms(),
                    error = %e,
                    retry_count = job.retry_count(),
                    "Caption attempt failed"
                );
                if e.is_quota_exhausted() {
                    self.sink.alert_quota_exhausted(OPERATION, &e.to_string());
                }
            }
        }

        result
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
