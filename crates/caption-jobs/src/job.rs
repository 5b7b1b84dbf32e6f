//! Caption job envelope and submission request.

use crate::error::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job priority lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work, dispatched last.
    Low,
    /// Default lane.
    Normal,
    /// Dispatched before all normal and low work.
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(JobError::Configuration(format!("Unknown priority: {other}"))),
        }
    }
}

/// Caption-generation request handed to [`crate::CaptionQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRequest {
    /// Reference to the image to caption.
    pub image_reference: String,

    /// Requested caption mood.
    pub mood: String,

    /// Requester identity, used for metrics only.
    pub requester_id: Option<String>,

    /// Priority lane.
    pub priority: Priority,
}

impl CaptionRequest {
    /// Create a normal-priority request without requester identity.
    pub fn new(image_reference: impl Into<String>, mood: impl Into<String>) -> Self {
        Self {
            image_reference: image_reference.into(),
            mood: mood.into(),
            requester_id: None,
            priority: Priority::Normal,
        }
    }

    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the requester identity.
    pub fn requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }
}

/// A submitted caption job as owned by the queue.
///
/// Everything except the retry counter is fixed at creation.
#[derive(Debug, Clone)]
pub struct CaptionJob {
    id: JobId,
    image_reference: String,
    mood: String,
    requester_id: Option<String>,
    priority: Priority,
    retry_count: u32,
    submitted_at: DateTime<Utc>,
    created_at: Instant,
    deadline: Instant,
}

impl CaptionJob {
    pub(crate) fn new(request: CaptionRequest, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            id: JobId::new(),
            image_reference: request.image_reference,
            mood: request.mood,
            requester_id: request.requester_id,
            priority: request.priority,
            retry_count: 0,
            submitted_at: Utc::now(),
            created_at,
            deadline: created_at + ttl,
        }
    }

    /// Job ID.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Image reference.
    pub fn image_reference(&self) -> &str {
        &self.image_reference
    }

    /// Caption mood.
    pub fn mood(&self) -> &str {
        &self.mood
    }

    /// Requester identity.
    pub fn requester_id(&self) -> Option<&str> {
        self.requester_id.as_deref()
    }

    /// Priority lane.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Number of retries consumed so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Wall-clock submission time.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Monotonic creation instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Instant after which the job is discarded unexecuted.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns true once `now` is past the deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    /// Time left before the deadline, zero when already past it.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Time spent since creation.
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Record the retry count granted by the retry policy.
    pub(crate) fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }
}
