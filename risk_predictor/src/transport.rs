//! Outbound seam of the prediction client.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use url::Url;

use crate::error::PredictError;
use crate::payload::PatientObservation;
use crate::types::{detail_message, PredictResponse, PredictionOutcome};

/// Something that can turn an observation into a prediction outcome.
pub trait PredictionTransport: Send + Sync {
    fn predict<'a>(
        &'a self,
        observation: &'a PatientObservation,
    ) -> BoxFuture<'a, Result<PredictionOutcome, PredictError>>;
}

impl<T: PredictionTransport + ?Sized> PredictionTransport for Arc<T> {
    fn predict<'a>(
        &'a self,
        observation: &'a PatientObservation,
    ) -> BoxFuture<'a, Result<PredictionOutcome, PredictError>> {
        (**self).predict(observation)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid service base URL {url:?}: {source}")]
pub struct EndpointError {
    pub url: String,
    #[source]
    pub source: url::ParseError,
}

/// Resolve `path` under `base`, keeping any path prefix the base carries.
pub fn endpoint(base: &str, path: &str) -> Result<Url, EndpointError> {
    let mut normalized = base.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized)
        .and_then(|root| root.join(path))
        .map_err(|source| EndpointError {
            url: base.to_string(),
            source,
        })
}

/// `POST <base>/predict` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPredictionTransport {
    http: reqwest::Client,
    url: Url,
}

impl HttpPredictionTransport {
    pub fn new(base_url: &str) -> Result<Self, EndpointError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, EndpointError> {
        Ok(Self {
            http,
            url: endpoint(base_url, "predict")?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PredictionTransport for HttpPredictionTransport {
    fn predict<'a>(
        &'a self,
        observation: &'a PatientObservation,
    ) -> BoxFuture<'a, Result<PredictionOutcome, PredictError>> {
        async move {
            let response = self
                .http
                .post(self.url.clone())
                .json(observation)
                .send()
                .await
                .map_err(|e| PredictError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| PredictError::Transport(e.to_string()))?;

            if !status.is_success() {
                return Err(PredictError::Service {
                    status: status.as_u16(),
                    detail: detail_message(&body),
                });
            }

            let parsed: PredictResponse =
                serde_json::from_slice(&body).map_err(|e| PredictError::Decode(e.to_string()))?;
            Ok(parsed.result)
        }
        .boxed()
    }
}
