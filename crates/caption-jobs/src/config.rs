//! Caption queue configuration.

use crate::error::{JobError, JobResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the caption queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of waiting jobs.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Maximum number of jobs executing against the provider at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum number of retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Time-to-live of a submitted job in seconds.
    #[serde(default = "default_job_ttl")]
    pub job_ttl_secs: u64,

    /// Retry delays in milliseconds, indexed by retry count.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Expiration sweep interval in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound for a single provider call in seconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Grace period granted to in-flight jobs on shutdown, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
            job_ttl_secs: default_job_ttl(),
            backoff_ms: default_backoff_ms(),
            sweep_interval_secs: default_sweep_interval(),
            provider_timeout_secs: default_provider_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_max_queue_size() -> usize {
    100
}

fn default_max_concurrent() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_job_ttl() -> u64 {
    30
}

fn default_backoff_ms() -> Vec<u64> {
    vec![1_000, 2_000, 5_000, 10_000, 30_000]
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_provider_timeout() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

impl QueueConfig {
    /// Returns the job time-to-live as Duration.
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    /// Returns the sweep interval as Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Returns the provider call bound as Duration.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Returns the shutdown grace period as Duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Checks the configuration for values the queue cannot run with.
    pub fn validate(&self) -> JobResult<()> {
        if self.max_queue_size == 0 {
            return Err(JobError::Configuration(
                "max_queue_size must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(JobError::Configuration(
                "max_concurrent must be greater than zero".to_string(),
            ));
        }
        if self.job_ttl_secs == 0 {
            return Err(JobError::Configuration(
                "job_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.backoff_ms.is_empty() {
            return Err(JobError::Configuration(
                "backoff_ms must contain at least one delay".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(JobError::Configuration(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which caption provider implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// In-process stand-in with randomized latency and failures.
    Simulated,
    /// Remote HTTP captioning service.
    Http,
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Simulated
    }
}

/// Caption provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider implementation.
    #[serde(default)]
    pub kind: ProviderKind,

    /// Endpoint for the HTTP provider.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token for the HTTP provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP client timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Probability (0.0 to 1.0) that a simulated call fails.
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Lower bound of simulated latency in milliseconds.
    #[serde(default = "default_min_latency")]
    pub min_latency_ms: u64,

    /// Upper bound of simulated latency in milliseconds.
    #[serde(default = "default_max_latency")]
    pub max_latency_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            endpoint: default_endpoint(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            failure_rate: default_failure_rate(),
            min_latency_ms: default_min_latency(),
            max_latency_ms: default_max_latency(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8000/v1/captions".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_failure_rate() -> f64 {
    0.1
}

fn default_min_latency() -> u64 {
    500
}

fn default_max_latency() -> u64 {
    2_000
}

impl ProviderConfig {
    /// Returns the HTTP request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
