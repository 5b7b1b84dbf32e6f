//! Caption provider abstraction.
//!
//! The queue only knows the [`CaptionProvider`] trait. Two implementations
//! ship with the crate: [`SimulatedCaptionProvider`] for local runs and
//! [`HttpCaptionProvider`] for a remote captioning service.

mod http;
mod simulated;

pub use http::HttpCaptionProvider;
pub use simulated::SimulatedCaptionProvider;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{JobResult, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;

/// External service that turns an image reference and a mood into a caption.
///
/// Implementations must be safe to call concurrently from several workers.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Provider name used in logs and metrics.
    fn name(&self) -> &str;

    /// Generate a caption.
    async fn generate(&self, image_reference: &str, mood: &str) -> Result<String, ProviderError>;
}

/// Build the provider selected by configuration.
pub fn from_config(config: &ProviderConfig) -> JobResult<Arc<dyn CaptionProvider>> {
    match config.kind {
        ProviderKind::Simulated => Ok(Arc::new(SimulatedCaptionProvider::from_config(config))),
        ProviderKind::Http => Ok(Arc::new(HttpCaptionProvider::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_simulated() {
        let provider = from_config(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "simulated");
    }

    #[test]
    fn test_from_config_http() {
        let config = ProviderConfig {
            kind: ProviderKind::Http,
            ..ProviderConfig::default()
        };
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "http");
    }
}
