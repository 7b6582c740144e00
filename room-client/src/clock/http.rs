//! HTTP `Date` header time source.

use super::{ClockError, TimeSource};
use crate::config::ClockConfig;
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, DATE};
use std::time::Duration;

/// Request timeout used by [`HttpTimeSource::new`].
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads the remote clock from the `Date` header of a plain `GET`.
///
/// The header has one-second resolution, which is what the default
/// 1000 ms precision accounts for.
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTimeSource {
    /// Create a time source that probes `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClockError> {
        Self::with_timeout(endpoint, DEFAULT_PROBE_TIMEOUT)
    }

    /// Create a time source whose probes give up after `timeout`.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClockError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a time source from the `[clock]` config section.
    pub fn from_config(config: &ClockConfig) -> Result<Self, ClockError> {
        Self::with_timeout(config.endpoint.clone(), config.timeout())
    }

    /// Create a time source using an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The probed URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn server_date_ms(&self) -> Result<i64, ClockError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let date = response
            .headers()
            .get(DATE)
            .ok_or(ClockError::MissingDate)?
            .to_str()
            .map_err(|e| ClockError::InvalidDate(e.to_string()))?;

        parse_http_date(date)
    }
}

/// Parse an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`) into Unix milliseconds.
pub fn parse_http_date(value: &str) -> Result<i64, ClockError> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.timestamp_millis())
        .map_err(|e| ClockError::InvalidDate(format!("{value:?}: {e}")))
}
