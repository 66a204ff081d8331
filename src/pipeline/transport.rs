//! HTTP transport: send an [`HttpRequestSpec`] and return the raw body.
//!
//! [`Transport`] is the seam between the pipeline and the network. The
//! production [`HttpTransport`] uses `reqwest`; tests substitute a scripted
//! implementation so the whole pipeline runs without sockets.
//!
//! Exactly one attempt is made per call. Retrying a failed extraction is the
//! caller's decision.

use crate::config::ExtractionConfig;
use crate::error::ReceiptError;
use crate::pipeline::request::HttpRequestSpec;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Executes a provider request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request` and return the response body.
    ///
    /// A 2xx with an empty body is [`ReceiptError::EmptyResponse`], a non-2xx
    /// is [`ReceiptError::ProviderHttpError`], and anything that prevents a
    /// response from arriving is [`ReceiptError::NetworkError`].
    async fn execute(&self, request: &HttpRequestSpec) -> Result<String, ReceiptError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client honouring `config.request_timeout_secs`.
    pub fn new(config: &ExtractionConfig) -> Result<Self, ReceiptError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ReceiptError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, …).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &HttpRequestSpec) -> Result<String, ReceiptError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = serde_json::to_vec(&request.body)
            .map_err(|e| ReceiptError::Internal(format!("Failed to serialise request: {e}")))?;
        debug!("POST {} ({} bytes)", request.url, body.len());

        let response = builder.body(body).send().await.map_err(network_error)?;
        let status = response.status();

        if !status.is_success() {
            warn!("{} returned HTTP {}", request.provider, status.as_u16());
            let body = response.text().await.ok().filter(|t| !t.is_empty());
            return Err(ReceiptError::ProviderHttpError {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        let text = response.text().await.map_err(network_error)?;
        if text.trim().is_empty() {
            return Err(ReceiptError::EmptyResponse);
        }

        debug!("{} returned {} bytes", request.provider, text.len());
        Ok(text)
    }
}

fn network_error(e: reqwest::Error) -> ReceiptError {
    let detail = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    ReceiptError::NetworkError { detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_and_without_timeout() {
        assert!(HttpTransport::new(&ExtractionConfig::default()).is_ok());
        let config = ExtractionConfig::builder().request_timeout_secs(5).build().unwrap();
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn transport_is_object_safe() {
        let t: std::sync::Arc<dyn Transport> =
            std::sync::Arc::new(HttpTransport::with_client(reqwest::Client::new()));
        drop(t);
    }
}
