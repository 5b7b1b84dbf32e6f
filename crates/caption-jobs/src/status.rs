//! Queue status snapshot.

use crate::job::JobId;
use crate::store::{LaneCounts, PriorityStore};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Waiting jobs.
    pub queue_length: usize,
    /// Jobs currently executing against the provider.
    pub in_flight_count: usize,
    /// Concurrency cap.
    pub max_concurrent: usize,
    /// Waiting-store capacity.
    pub max_queue_size: usize,
    /// Mean age of the jobs currently waiting, in milliseconds; 0 when empty.
    pub avg_wait_ms: u64,
    /// Waiting jobs per lane.
    pub lanes: LaneCounts,
}

impl QueueStatus {
    pub(crate) fn capture(
        store: &PriorityStore,
        in_flight_count: usize,
        max_concurrent: usize,
        now: Instant,
    ) -> Self {
        Self {
            queue_length: store.len(),
            in_flight_count,
            max_concurrent,
            max_queue_size: store.capacity(),
            avg_wait_ms: average_wait_ms(store, now),
            lanes: store.lane_counts(),
        }
    }
}

fn average_wait_ms(store: &PriorityStore, now: Instant) -> u64 {
    let count = store.len();
    if count == 0 {
        return 0;
    }
    let total: u128 = store.iter().map(|job| job.waited(now).as_millis()).sum();
    u64::try_from(total / count as u128).unwrap_or(u64::MAX)
}

/// Outcome of a bounded shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// True when every in-flight job finished within the grace period.
    pub drained: bool,
    /// Jobs still executing when the grace period ran out.
    pub abandoned: Vec<JobId>,
    /// Waiting jobs discarded because they were never dispatched.
    pub discarded_waiting: usize,
}
