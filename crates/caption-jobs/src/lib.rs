//! Caption Jobs - Bounded Priority Queue for Caption Generation
//!
//! An in-memory task queue that accepts caption-generation jobs and runs
//! them against an external captioning provider:
//! - Bounded waiting store with synchronous rejection when full
//! - Priority lanes (high, normal, low) with retries ahead of all new work
//! - Concurrency cap on in-flight provider calls
//! - Fixed-table retry backoff with a retry ceiling
//! - Per-job time-to-live, enforced at dispatch and by a periodic sweeper
//! - Per-attempt reporting to a metrics sink, with a quota-exhaustion alert
//! - Bounded graceful shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption Queue Architecture                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  submit()                                                        │
//! │     │                                                            │
//! │     ▼                                                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                 Priority Store (bounded)                 │    │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐        │    │
//! │  │  │ Retries │ │  High   │ │ Normal  │ │   Low   │        │    │
//! │  │  └────┬────┘ └────┬────┘ └────┬────┘ └────┬────┘        │    │
//! │  │       └───────────┴──────────┴───────────┘              │    │
//! │  │                        │           ▲ Expiration Sweeper  │    │
//! │  └────────────────────────┼───────────┴─────────────────────┘    │
//! │                           ▼                                      │
//! │                 Dispatcher (woken on submit,                     │
//! │                  completion and reinsertion)                     │
//! │                           │  ≤ max_concurrent                    │
//! │                           ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │   Worker ──▶ CaptionProvider        MetricsSink ◀── Worker │  │
//! │  └─────────────────────────┬───────────────────────────────┘    │
//! │                 failure    │                                     │
//! │                            ▼                                     │
//! │            RetryPolicy: back off, reinsert at front,             │
//! │            or drop once retries are exhausted                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use caption_jobs::{CaptionQueue, CaptionRequest, FacadeMetricsSink, Priority, QueueConfig};
//! use caption_jobs::provider::SimulatedCaptionProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(SimulatedCaptionProvider::from_config(&Default::default()));
//! let queue = CaptionQueue::new(QueueConfig::default(), provider, Arc::new(FacadeMetricsSink))?;
//! queue.start()?;
//!
//! let job_id = queue.submit(
//!     CaptionRequest::new("s3://images/cat.png", "playful")
//!         .priority(Priority::High)
//!         .requester("user-42"),
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod provider;
pub mod queue;
pub mod retry;
pub mod status;
pub mod store;
pub mod worker;

pub use config::{ProviderConfig, ProviderKind, QueueConfig};
pub use error::{JobError, JobResult, ProviderError};
pub use job::{CaptionJob, CaptionRequest, JobId, Priority};
pub use metrics::{register_metrics, FacadeMetricsSink, MetricsSink, OperationRecord, QueueMetrics};
pub use provider::CaptionProvider;
pub use queue::CaptionQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use status::{QueueStatus, ShutdownReport};
pub use store::{LaneCounts, PriorityStore};
pub use worker::Worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::job::{CaptionRequest, Priority};
    pub use crate::metrics::MetricsSink;
    pub use crate::provider::CaptionProvider;
    pub use crate::queue::CaptionQueue;
    pub use crate::{JobError, JobId, JobResult, ProviderError};
}
