//! The caption queue: submission, dispatch, retry, expiration and shutdown.

use crate::config::QueueConfig;
use crate::error::{JobError, JobResult, ProviderError};
use crate::job::{CaptionJob, CaptionRequest, JobId};
use crate::metrics::{MetricsSink, QueueMetrics};
use crate::provider::CaptionProvider;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::status::{QueueStatus, ShutdownReport};
use crate::store::PriorityStore;
use crate::worker::Worker;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Store and in-flight set, guarded together.
struct QueueState {
    store: PriorityStore,
    in_flight: HashSet<JobId>,
}

struct Shared {
    config: QueueConfig,
    retry_policy: RetryPolicy,
    worker: Worker,
    state: Mutex<QueueState>,
    /// Wakes the dispatcher on submit, completion and retry reinsertion.
    wake: Notify,
    in_flight_tx: watch::Sender<usize>,
    shutdown_tx: broadcast::Sender<()>,
    accepting: AtomicBool,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Bounded, priority-aware caption job queue.
///
/// Cloning is cheap and every clone drives the same queue.
#[derive(Clone)]
pub struct CaptionQueue {
    shared: Arc<Shared>,
}

impl CaptionQueue {
    /// Create a queue. Nothing runs until [`CaptionQueue::start`].
    pub fn new(
        config: QueueConfig,
        provider: Arc<dyn CaptionProvider>,
        sink: Arc<dyn MetricsSink>,
    ) -> JobResult<Self> {
        config.validate()?;

        let (in_flight_tx, _) = watch::channel(0);
        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Shared {
            retry_policy: RetryPolicy::from_config(&config),
            worker: Worker::new(provider, sink, config.provider_timeout()),
            state: Mutex::new(QueueState {
                store: PriorityStore::new(config.max_queue_size),
                in_flight: HashSet::new(),
            }),
            wake: Notify::new(),
            in_flight_tx,
            shutdown_tx,
            accepting: AtomicBool::new(true),
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Accept a caption job.
    ///
    /// Returns as soon as the job is stored; the caller never hears about
    /// the job again.
    pub fn submit(&self, request: CaptionRequest) -> JobResult<JobId> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            QueueMetrics::job_rejected("shutting_down");
            return Err(JobError::ShuttingDown);
        }

        let job = CaptionJob::new(request, self.shared.config.job_ttl());
        let job_id = job.id().clone();
        let priority = job.priority();

        let (queue_length, in_flight) = {
            let mut state = self.shared.state.lock();
            if state.store.push(job).is_err() {
                drop(state);
                QueueMetrics::job_rejected("queue_full");
                warn!(priority = %priority, "Queue full, submission rejected");
                return Err(JobError::QueueFull {
                    capacity: self.shared.config.max_queue_size,
                });
            }
            (state.store.len(), state.in_flight.len())
        };

        QueueMetrics::job_submitted(&priority.to_string());
        QueueMetrics::update_sizes(queue_length, in_flight);
        info!(job_id = %job_id, priority = %priority, queue_length, "Caption job submitted");

        self.shared.wake.notify_one();
        Ok(job_id)
    }

    /// Snapshot of queue depth, in-flight count and average wait.
    pub fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock();
        QueueStatus::capture(
            &state.store,
            state.in_flight.len(),
            self.shared.config.max_concurrent,
            Instant::now(),
        )
    }

    /// Emergency drain: forget every waiting job and all in-flight ids.
    ///
    /// Running workers are not cancelled. Returns the number of waiting jobs
    /// discarded.
    pub fn drain(&self) -> usize {
        let (discarded, forgotten) = {
            let mut state = self.shared.state.lock();
            let discarded = state.store.clear();
            let forgotten = state.in_flight.len();
            state.in_flight.clear();
            self.shared.publish_in_flight(&state);
            (discarded, forgotten)
        };

        QueueMetrics::jobs_dropped("drained", discarded as u64);
        QueueMetrics::update_sizes(0, 0);
        warn!(
            discarded_waiting = discarded,
            forgotten_in_flight = forgotten,
            "Queue drained"
        );
        discarded
    }

    /// Remove every waiting job past its deadline. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep_expired()
    }

    /// Spawn the dispatcher and the expiration sweeper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> JobResult<()> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(JobError::ShuttingDown);
        }
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::AlreadyRunning);
        }

        info!(
            max_concurrent = self.shared.config.max_concurrent,
            max_queue_size = self.shared.config.max_queue_size,
            max_retries = self.shared.config.max_retries,
            job_ttl_secs = self.shared.config.job_ttl_secs,
            "Starting caption queue"
        );

        let dispatcher = tokio::spawn(
            run_dispatcher(self.shared.clone(), self.shared.shutdown_tx.subscribe())
                .instrument(info_span!("caption_dispatcher")),
        );
        let sweeper = tokio::spawn(
            run_sweeper(self.shared.clone(), self.shared.shutdown_tx.subscribe())
                .instrument(info_span!("caption_sweeper")),
        );

        self.shared.tasks.lock().extend([dispatcher, sweeper]);
        Ok(())
    }

    /// Returns true while the dispatcher is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop accepting work and wait up to `grace` for in-flight jobs.
    ///
    /// Waiting jobs are discarded; jobs still running after `grace` are
    /// reported as abandoned.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.shared.accepting.store(false, Ordering::SeqCst);
        info!(grace_ms = grace.as_millis() as u64, "Shutting down caption queue");

        let _ = self.shared.shutdown_tx.send(());
        let tasks = std::mem::take(&mut *self.shared.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Queue task ended abnormally");
            }
        }

        let mut in_flight_rx = self.shared.in_flight_tx.subscribe();
        let drained = matches!(
            timeout(grace, in_flight_rx.wait_for(|count| *count == 0)).await,
            Ok(Ok(_))
        );

        let (abandoned, discarded_waiting) = {
            let mut state = self.shared.state.lock();
            let abandoned: Vec<JobId> = state.in_flight.iter().cloned().collect();
            (abandoned, state.store.clear())
        };

        if drained {
            info!(discarded_waiting, "Caption queue drained cleanly");
        } else {
            let ids: Vec<&str> = abandoned.iter().map(JobId::as_str).collect();
            warn!(
                abandoned = ?ids,
                discarded_waiting,
                "Shutdown grace period elapsed with jobs still in flight"
            );
        }
        QueueMetrics::jobs_dropped("shutdown", discarded_waiting as u64);

        self.shared.running.store(false, Ordering::SeqCst);
        ShutdownReport {
            drained,
            abandoned,
            discarded_waiting,
        }
    }
}

impl Shared {
    fn publish_in_flight(&self, state: &QueueState) {
        self.in_flight_tx.send_replace(state.in_flight.len());
    }

    /// Move waiting jobs into execution until the cap is hit or the store is empty.
    fn dispatch_ready(self: &Arc<Self>) {
        loop {
            let job = {
                let mut state = self.state.lock();
                if state.in_flight.len() >= self.config.max_concurrent {
                    debug!(in_flight = state.in_flight.len(), "Concurrency cap reached");
                    break;
                }
                let Some(job) = state.store.pop_front() else {
                    break;
                };

                let now = Instant::now();
                if job.is_expired(now) {
                    drop(state);
                    let reason = JobError::Expired {
                        job_id: job.id().to_string(),
                    };
                    QueueMetrics::jobs_dropped(reason.kind(), 1);
                    info!(
                        job_id = %job.id(),
                        priority = %job.priority(),
                        retry_count = job.retry_count(),
                        submitted_at = %job.submitted_at(),
                        "{reason}"
                    );
                    continue;
                }

                state.in_flight.insert(job.id().clone());
                self.publish_in_flight(&state);
                QueueMetrics::update_sizes(state.store.len(), state.in_flight.len());
                QueueMetrics::job_dispatched(&job.priority().to_string(), job.waited(now));
                job
            };

            self.spawn_worker(job);
        }
    }

    fn spawn_worker(self: &Arc<Self>, job: CaptionJob) {
        let shared = Arc::clone(self);
        let span = info_span!(
            "caption_worker",
            job_id = %job.id(),
            priority = %job.priority(),
            attempt = job.retry_count() + 1
        );

        tokio::spawn(
            async move {
                let guard = InFlightGuard {
                    shared: &shared,
                    job_id: job.id().clone(),
                };
                let result = shared.worker.execute(&job).await;
                drop(guard);

                if let Err(e) = result {
                    shared.handle_failure(job, e).await;
                }
            }
            .instrument(span),
        );
    }

    /// Retry manager: back off and reinsert, or give up.
    async fn handle_failure(&self, mut job: CaptionJob, error: ProviderError) {
        match self.retry_policy.decide(job.retry_count()) {
            RetryDecision::Retry { retry_count, delay } => {
                job.set_retry_count(retry_count);
                debug!(
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling retry"
                );
                tokio::time::sleep(delay).await;
                self.reinsert(job);
            }
            RetryDecision::GiveUp { attempts } => {
                let reason = JobError::MaxRetriesExceeded {
                    job_id: job.id().to_string(),
                    attempts,
                };
                QueueMetrics::jobs_dropped(reason.kind(), 1);
                error!(
                    last_error = %error,
                    submitted_at = %job.submitted_at(),
                    "{reason}; job dropped"
                );
            }
        }
    }

    fn reinsert(&self, job: CaptionJob) {
        if !self.accepting.load(Ordering::SeqCst) {
            QueueMetrics::jobs_dropped("shutdown", 1);
            warn!(retry_count = job.retry_count(), "Queue shutting down, retry dropped");
            return;
        }

        let retry_count = job.retry_count();
        let pushed = {
            let mut state = self.state.lock();
            let pushed = state.store.push_front(job).is_ok();
            QueueMetrics::update_sizes(state.store.len(), state.in_flight.len());
            pushed
        };

        if pushed {
            QueueMetrics::job_retried(retry_count);
            info!(retry_count, "Job reinserted for retry");
            self.wake.notify_one();
        } else {
            QueueMetrics::jobs_dropped("queue_full", 1);
            warn!(retry_count, "Queue full, retry dropped");
        }
    }

    fn sweep_expired(&self) -> usize {
        let (expired, queue_length, in_flight) = {
            let mut state = self.state.lock();
            let expired = state.store.remove_expired(Instant::now());
            (expired, state.store.len(), state.in_flight.len())
        };

        let count = expired.len();
        if count > 0 {
            QueueMetrics::jobs_dropped("expired", count as u64);
            QueueMetrics::update_sizes(queue_length, in_flight);
            info!(expired = count, queue_length, "Swept expired jobs");
        } else {
            debug!(queue_length, "Expiration sweep found nothing");
        }
        count
    }
}

/// Removes a job from the in-flight set when the worker finishes, however
/// it finishes.
struct InFlightGuard<'a> {
    shared: &'a Shared,
    job_id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.in_flight.remove(&self.job_id);
            self.shared.publish_in_flight(&state);
            QueueMetrics::update_sizes(state.store.len(), state.in_flight.len());
        }
        self.shared.wake.notify_one();
    }
}

async fn run_dispatcher(shared: Arc<Shared>, mut shutdown_rx: broadcast::Receiver<()>) {
    debug!("Dispatcher started");
    loop {
        shared.dispatch_ready();

        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Dispatcher received shutdown signal");
                break;
            }
            () = shared.wake.notified() => {}
        }
    }
}

async fn run_sweeper(shared: Arc<Shared>, mut shutdown_rx: broadcast::Receiver<()>) {
    let period = shared.config.sweep_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Sweeper received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                shared.sweep_expired();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Priority;
    use crate::metrics::OperationRecord;
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    struct NullSink;

    impl MetricsSink for NullSink {
        fn record(&self, _record: &OperationRecord) {}
        fn alert_quota_exhausted(&self, _operation: &str, _error_message: &str) {}
    }

    struct EchoProvider;

    #[async_trait]
    impl CaptionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, image: &str, mood: &str) -> Result<String, ProviderError> {
            Ok(format!("{mood}: {image}"))
        }
    }

    fn queue(config: QueueConfig) -> CaptionQueue {
        CaptionQueue::new(config, Arc::new(EchoProvider), Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = QueueConfig {
            max_queue_size: 0,
            ..QueueConfig::default()
        };
        let result = CaptionQueue::new(config, Arc::new(EchoProvider), Arc::new(NullSink));
        assert!(matches!(result, Err(JobError::Configuration(_))));
    }

    #[test]
    fn test_submit_increases_queue_length() {
        let queue = queue(QueueConfig::default());
        let before = queue.status().queue_length;
        let id = queue.submit(CaptionRequest::new("img", "calm")).unwrap();
        let status = queue.status();
        assert_eq!(status.queue_length, before + 1);
        assert_eq!(status.in_flight_count, 0);
        assert!(!id.as_str().is_empty());
    }

    #[test]
    fn test_drain_clears_waiting_jobs() {
        let queue = queue(QueueConfig::default());
        for priority in [Priority::Low, Priority::Normal, Priority::High] {
            queue
                .submit(CaptionRequest::new("img", "calm").priority(priority))
                .unwrap();
        }
        assert_eq!(queue.drain(), 3);
        assert_eq!(queue.status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let queue = queue(QueueConfig::default());
        assert_ok!(queue.start());
        assert!(queue.is_running());
        assert!(matches!(queue.start(), Err(JobError::AlreadyRunning)));
        queue.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_start_after_shutdown_fails() {
        let queue = queue(QueueConfig::default());
        queue.shutdown(Duration::from_millis(10)).await;
        assert!(matches!(queue.start(), Err(JobError::ShuttingDown)));
        assert_err!(queue.submit(CaptionRequest::new("img", "calm")));
    }
}
