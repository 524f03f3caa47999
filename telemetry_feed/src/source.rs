//! Where the poller gets its events from.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use url::Url;

use crate::event::TelemetryEvent;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("metrics endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed metrics response: {0}")]
    Decode(String),
    #[error("metrics fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Returns the service's recent events, newest first.
pub trait MetricsSource: Send + Sync {
    fn fetch_metrics(&self) -> BoxFuture<'_, Result<Vec<TelemetryEvent>, FetchError>>;
}

impl<S: MetricsSource + ?Sized> MetricsSource for Arc<S> {
    fn fetch_metrics(&self) -> BoxFuture<'_, Result<Vec<TelemetryEvent>, FetchError>> {
        (**self).fetch_metrics()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid metrics base URL {url:?}: {source}")]
pub struct EndpointError {
    pub url: String,
    #[source]
    pub source: url::ParseError,
}

/// `GET <base>/metrics` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpMetricsSource {
    pub fn new(base_url: &str) -> Result<Self, EndpointError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, EndpointError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let url = Url::parse(&base)
            .and_then(|root| root.join("metrics"))
            .map_err(|source| EndpointError {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl MetricsSource for HttpMetricsSource {
    fn fetch_metrics(&self) -> BoxFuture<'_, Result<Vec<TelemetryEvent>, FetchError>> {
        async move {
            let response = self
                .http
                .get(self.url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
        }
        .boxed()
    }
}
