//! Bounded, priority-ordered store of waiting jobs.

use crate::job::{CaptionJob, Priority};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::time::Instant;

/// Waiting-job counts per lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneCounts {
    /// Reinserted retries, dispatched before everything else.
    pub retry: usize,
    /// Fresh high-priority jobs.
    pub high: usize,
    /// Fresh normal-priority jobs.
    pub normal: usize,
    /// Fresh low-priority jobs.
    pub low: usize,
}

/// Bounded store of waiting jobs.
///
/// Dispatch order is: retries (most recently reinserted first), then high,
/// normal and low, each FIFO. The capacity covers all lanes together.
#[derive(Debug)]
pub struct PriorityStore {
    capacity: usize,
    retry: VecDeque<CaptionJob>,
    high: VecDeque<CaptionJob>,
    normal: VecDeque<CaptionJob>,
    low: VecDeque<CaptionJob>,
}

impl PriorityStore {
    /// Create an empty store.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            retry: VecDeque::new(),
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    /// Maximum number of waiting jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of waiting jobs across all lanes.
    pub fn len(&self) -> usize {
        self.retry.len() + self.high.len() + self.normal.len() + self.low.len()
    }

    /// Returns true if no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if no further job can be accepted.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Insert a fresh submission behind the jobs of its own lane.
    ///
    /// Hands the job back when the store is full.
    pub fn push(&mut self, job: CaptionJob) -> Result<(), CaptionJob> {
        if self.is_full() {
            return Err(job);
        }
        match job.priority() {
            Priority::High => self.high.push_back(job),
            Priority::Normal => self.normal.push_back(job),
            Priority::Low => self.low.push_back(job),
        }
        Ok(())
    }

    /// Reinsert a retried job at the absolute front.
    ///
    /// Hands the job back when the store is full.
    pub fn push_front(&mut self, job: CaptionJob) -> Result<(), CaptionJob> {
        if self.is_full() {
            return Err(job);
        }
        self.retry.push_front(job);
        Ok(())
    }

    /// Remove and return the next job in dispatch order.
    pub fn pop_front(&mut self) -> Option<CaptionJob> {
        self.retry
            .pop_front()
            .or_else(|| self.high.pop_front())
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Remove every job whose deadline has passed, returning them.
    pub fn remove_expired(&mut self, now: Instant) -> Vec<CaptionJob> {
        let mut expired = Vec::new();
        for lane in self.lanes_mut() {
            let mut kept = VecDeque::with_capacity(lane.len());
            for job in lane.drain(..) {
                if job.is_expired(now) {
                    expired.push(job);
                } else {
                    kept.push_back(job);
                }
            }
            *lane = kept;
        }
        expired
    }

    /// Remove every waiting job.
    pub fn clear(&mut self) -> usize {
        let removed = self.len();
        for lane in self.lanes_mut() {
            lane.clear();
        }
        removed
    }

    /// Iterate waiting jobs in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &CaptionJob> {
        self.retry
            .iter()
            .chain(self.high.iter())
            .chain(self.normal.iter())
            .chain(self.low.iter())
    }

    /// Per-lane waiting counts.
    pub fn lane_counts(&self) -> LaneCounts {
        LaneCounts {
            retry: self.retry.len(),
            high: self.high.len(),
            normal: self.normal.len(),
            low: self.low.len(),
        }
    }

    fn lanes_mut(&mut self) -> [&mut VecDeque<CaptionJob>; 4] {
        [
            &mut self.retry,
            &mut self.high,
            &mut self.normal,
            &mut self.low,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CaptionRequest, JobId};
    use std::time::Duration;

    fn job(image: &str, priority: Priority) -> CaptionJob {
        CaptionJob::new(
            CaptionRequest::new(image, "neutral").priority(priority),
            Duration::from_secs(30),
        )
    }

    fn order(store: &PriorityStore) -> Vec<String> {
        store.iter().map(|j| j.image_reference().to_string()).collect()
    }

    #[test]
    fn test_lane_ordering() {
        let mut store = PriorityStore::new(10);
        store.push(job("low-1", Priority::Low)).unwrap();
        store.push(job("normal-1", Priority::Normal)).unwrap();
        store.push(job("high-1", Priority::High)).unwrap();
        store.push(job("normal-2", Priority::Normal)).unwrap();
        store.push(job("high-2", Priority::High)).unwrap();

        assert_eq!(
            order(&store),
            vec!["high-1", "high-2", "normal-1", "normal-2", "low-1"]
        );
    }

    #[test]
    fn test_retry_precedes_fresh_high() {
        let mut store = PriorityStore::new(10);
        store.push(job("high-1", Priority::High)).unwrap();
        store.push_front(job("retry-low", Priority::Low)).unwrap();
        store.push(job("high-2", Priority::High)).unwrap();

        let first = store.pop_front().unwrap();
        assert_eq!(first.image_reference(), "retry-low");
        assert_eq!(order(&store), vec!["high-1", "high-2"]);
    }

    #[test]
    fn test_latest_retry_goes_first() {
        let mut store = PriorityStore::new(10);
        store.push_front(job("retry-a", Priority::Normal)).unwrap();
        store.push_front(job("retry-b", Priority::Normal)).unwrap();
        assert_eq!(order(&store), vec!["retry-b", "retry-a"]);
    }

    #[test]
    fn test_capacity_is_shared_across_lanes() {
        let mut store = PriorityStore::new(2);
        store.push(job("a", Priority::Low)).unwrap();
        store.push_front(job("b", Priority::High)).unwrap();
        assert!(store.is_full());

        let rejected = store.push(job("c", Priority::High)).unwrap_err();
        assert_eq!(rejected.image_reference(), "c");
        assert!(store.push_front(job("d", Priority::High)).is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_lane_counts_and_clear() {
        let mut store = PriorityStore::new(10);
        store.push(job("a", Priority::High)).unwrap();
        store.push(job("b", Priority::Low)).unwrap();
        store.push_front(job("c", Priority::Normal)).unwrap();

        let counts = store.lane_counts();
        assert_eq!(counts.retry, 1);
        assert_eq!(counts.high, 1);
        assert_eq!(counts.normal, 0);
        assert_eq!(counts.low, 1);

        assert_eq!(store.clear(), 3);
        assert!(store.is_empty());
        assert!(store.pop_front().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired_keeps_fresh_jobs_in_order() {
        let mut store = PriorityStore::new(10);
        store.push(job("old-normal", Priority::Normal)).unwrap();
        store.push(job("old-low", Priority::Low)).unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        store.push(job("new-normal", Priority::Normal)).unwrap();
        store.push(job("new-high", Priority::High)).unwrap();

        tokio::time::advance(Duration::from_secs(15)).await;
        let expired = store.remove_expired(Instant::now());

        let mut expired_ids: Vec<&str> = expired.iter().map(|j| j.image_reference()).collect();
        expired_ids.sort_unstable();
        assert_eq!(expired_ids, vec!["old-low", "old-normal"]);
        assert_eq!(order(&store), vec!["new-high", "new-normal"]);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = PriorityStore::new(3);
        for _ in 0..3 {
            store.push(job("x", Priority::Normal)).unwrap();
        }
        let ids: std::collections::HashSet<JobId> = store.iter().map(|j| j.id().clone()).collect();
        assert_eq!(ids.len(), 3);
    }
}
