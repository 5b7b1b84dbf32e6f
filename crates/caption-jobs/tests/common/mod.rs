//! Deterministic provider and sink doubles for queue tests.

#![allow(dead_code)]

use async_trait::async_trait;
use caption_jobs::{
    CaptionProvider, CaptionQueue, MetricsSink, OperationRecord, ProviderError, QueueConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Provider whose behaviour is scripted per image reference.
pub struct ScriptedProvider {
    latency: Duration,
    always_fail: Option<ProviderError>,
    failures: Mutex<HashMap<String, (u32, ProviderError)>>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<(String, Instant)>>,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl ScriptedProvider {
    /// Succeeds immediately for every image.
    pub fn succeeding() -> Self {
        Self {
            latency: Duration::ZERO,
            always_fail: None,
            failures: Mutex::new(HashMap::new()),
            gate: None,
            calls: Mutex::new(Vec::new()),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    /// Fails every call with the given error.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            always_fail: Some(error),
            ..Self::succeeding()
        }
    }

    /// Each call takes `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls block until the semaphore hands out a permit.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// The first `times` calls for `image` fail with `error`.
    pub fn failing_for(self, image: &str, times: u32, error: ProviderError) -> Self {
        self.failures.lock().insert(image.to_string(), (times, error));
        self
    }

    /// Image references in call order.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(image, _)| image.clone()).collect()
    }

    /// Instants at which calls started.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, at)| *at).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of simultaneous calls observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, image: &str) -> Option<ProviderError> {
        if let Some(error) = &self.always_fail {
            return Some(error.clone());
        }
        let mut failures = self.failures.lock();
        match failures.get_mut(image) {
            Some((remaining, error)) if *remaining > 0 => {
                *remaining -= 1;
                Some(error.clone())
            }
            _ => None,
        }
    }
}

struct CallGuard<'a>(&'a AtomicUsize);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CaptionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, image_reference: &str, mood: &str) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .push((image_reference.to_string(), Instant::now()));
        let now_running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now_running, Ordering::SeqCst);
        let _running = CallGuard(&self.current);

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.scripted_failure(image_reference) {
            Some(error) => Err(error),
            None => Ok(format!("{mood} caption for {image_reference}")),
        }
    }
}

/// Sink that keeps every record and alert.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<OperationRecord>>,
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().clone()
    }

    pub fn successes(&self) -> usize {
        self.records.lock().iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.records.lock().iter().filter(|r| !r.is_success()).count()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, record: &OperationRecord) {
        self.records.lock().push(record.clone());
    }

    fn alert_quota_exhausted(&self, operation: &str, error_message: &str) {
        self.alerts
            .lock()
            .push((operation.to_string(), error_message.to_string()));
    }
}

pub fn unavailable() -> ProviderError {
    ProviderError::Rejected {
        status: 503,
        message: "provider unavailable".to_string(),
    }
}

/// Build a queue around the given doubles.
pub fn queue_with(
    config: QueueConfig,
    provider: &Arc<ScriptedProvider>,
    sink: &Arc<RecordingSink>,
) -> CaptionQueue {
    CaptionQueue::new(config, provider.clone(), sink.clone()).expect("valid queue config")
}
