//! Fetching gateway documents and filter answers.

use crate::error::{GatewayError, GatewayResult};
use bytes::Bytes;
use hermes_pipeline::BoxFuture;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::debug;

/// A fetched response.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl Fetched {
    /// Creates a fetched response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response indicates a client error.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Get the response body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Performs GET requests for the gateway processors.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetches the URI. Transport failures are errors, any HTTP status is a
    /// [`Fetched`].
    fn fetch<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, GatewayResult<Fetched>>;
}

/// A [`Fetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Option<Url>,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher; relative URIs are resolved against `base`.
    pub fn new(base: Option<&str>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| GatewayError::fetch(base.unwrap_or_default(), format!("failed to create client: {e}")))?;
        let base = base
            .map(Url::parse)
            .transpose()
            .map_err(|e| GatewayError::fetch(base.unwrap_or_default(), format!("invalid base URL: {e}")))?;
        Ok(Self { client, base, timeout })
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn resolve(&self, uri: &str) -> GatewayResult<Url> {
        let resolved = match &self.base {
            Some(base) => base.join(uri),
            None => Url::parse(uri),
        };
        resolved.map_err(|e| GatewayError::fetch(uri, format!("invalid URL: {e}")))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, GatewayResult<Fetched>> {
        Box::pin(async move {
            let url = self.resolve(uri)?;
            let started = Instant::now();
            let response = self
                .client
                .get(url)
                .header(http::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| GatewayError::fetch(uri, format!("request failed: {e}")))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::fetch(uri, format!("failed to read body: {e}")))?;

            metrics::counter!("hermes_gateway_fetches_total").increment(1);
            metrics::histogram!("hermes_gateway_fetch_duration_seconds").record(started.elapsed().as_secs_f64());
            debug!(uri, status, bytes = body.len(), "Fetched");
            Ok(Fetched { status, body })
        })
    }
}
