//! In-process caption provider with randomized latency and failures.

use super::CaptionProvider;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Stand-in provider for local runs and demos.
///
/// Sleeps for a random latency, then fails with probability `failure_rate`.
/// One in five failures is reported as quota exhaustion.
#[derive(Debug, Clone)]
pub struct SimulatedCaptionProvider {
    failure_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
}

impl SimulatedCaptionProvider {
    /// Create a simulated provider.
    pub fn new(failure_rate: f64, min_latency: Duration, max_latency: Duration) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            min_latency: min_latency.min(max_latency),
            max_latency,
        }
    }

    /// Create from provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.failure_rate,
            Duration::from_millis(config.min_latency_ms),
            Duration::from_millis(config.max_latency_ms),
        )
    }

    fn sample_latency(&self) -> Duration {
        if self.max_latency <= self.min_latency {
            return self.min_latency;
        }
        rand::thread_rng().gen_range(self.min_latency..=self.max_latency)
    }
}

#[async_trait]
impl CaptionProvider for SimulatedCaptionProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn generate(&self, image_reference: &str, mood: &str) -> Result<String, ProviderError> {
        let latency = self.sample_latency();
        tokio::time::sleep(latency).await;

        let (fails, quota) = {
            let mut rng = rand::thread_rng();
            (rng.gen_bool(self.failure_rate), rng.gen_ratio(1, 5))
        };

        debug!(
            image_reference,
            mood,
            latency_ms = latency.as_millis() as u64,
            fails,
            "Simulated caption call"
        );

        if !fails {
            return Ok(format!("A {mood} caption for {image_reference}"));
        }
        if quota {
            Err(ProviderError::QuotaExhausted(
                "simulated provider quota exceeded".to_string(),
            ))
        } else {
            Err(ProviderError::Rejected {
                status: 503,
                message: "simulated provider unavailable".to_string(),
            })
        }
    }
}
