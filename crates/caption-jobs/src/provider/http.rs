//! Remote caption provider over HTTP.

use super::CaptionProvider;
use crate::config::ProviderConfig;
use crate::error::{JobError, JobResult, ProviderError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct CaptionRequestBody<'a> {
    image_reference: &'a str,
    mood: &'a str,
}

#[derive(Debug, Deserialize)]
struct CaptionResponseBody {
    caption: String,
}

/// Caption provider that POSTs JSON to a captioning endpoint.
///
/// Expects `{"caption": "..."}` back. HTTP 429 maps to quota exhaustion.
pub struct HttpCaptionProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCaptionProvider {
    /// Create a provider from configuration.
    pub fn new(config: &ProviderConfig) -> JobResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| JobError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        info!(endpoint = %config.endpoint, "Initializing HTTP caption provider");

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
        ProviderError::QuotaExhausted(body)
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[async_trait]
impl CaptionProvider for HttpCaptionProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, image_reference: &str, mood: &str) -> Result<String, ProviderError> {
        let mut request = self.client.post(&self.endpoint).json(&CaptionRequestBody {
            image_reference,
            mood,
        });
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Caption provider returned error status");
            return Err(classify_status(status, body));
        }

        let body: CaptionResponseBody = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if body.caption.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty caption".to_string()));
        }
        Ok(body.caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_too_many_requests() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(matches!(err, ProviderError::QuotaExhausted(_)));
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_status(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(matches!(err, ProviderError::Rejected { status: 502, .. }));
        assert!(!err.is_quota_exhausted());
    }

    #[test]
    fn test_request_body_shape() {
        let body = CaptionRequestBody {
            image_reference: "img-9",
            mood: "sarcastic",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["image_reference"], "img-9");
        assert_eq!(json["mood"], "sarcastic");
    }

    #[test]
    fn test_response_body_parse() {
        let body: CaptionResponseBody = serde_json::from_str(r#"{"caption": "hello"}"#).unwrap();
        assert_eq!(body.caption, "hello");
    }
}
