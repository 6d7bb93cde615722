//! Remote rate source client.
//!
//! The upstream answers `GET /api/v1/rate/{route}` with either
//! `{"rate": 2.712}` or `{"err_code": 3, "err_message": "..."}`.

use crate::error::{FeedError, FeedResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Anything that can quote the current rate of a route.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn rate(&self, route: &str) -> FeedResult<f64>;
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct RateItConfig {
    pub upstream: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RateItConfig {
    fn default() -> Self {
        Self {
            upstream: DEFAULT_UPSTREAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl RateItConfig {
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        let upstream = upstream.into();
        if !upstream.is_empty() {
            self.upstream = upstream;
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(default)]
    rate: Option<f64>,
    #[serde(default)]
    err_code: i64,
    #[serde(default)]
    err_message: String,
}

/// HTTP client for the rate upstream.
#[derive(Debug, Clone)]
pub struct RateItClient {
    http: reqwest::Client,
    base: Url,
    retry: RetryPolicy,
}

impl RateItClient {
    pub fn new(config: RateItConfig) -> FeedResult<Self> {
        let mut upstream = config.upstream;
        if !upstream.ends_with('/') {
            upstream.push('/');
        }
        let base = Url::parse(&upstream)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            retry: config.retry,
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.base
    }

    fn rate_url(&self, route: &str) -> FeedResult<Url> {
        let route = route.trim_start_matches('/');
        Ok(self.base.join(&format!("api/v1/rate/{}", route))?)
    }

    async fn fetch_once(&self, url: &Url) -> FeedResult<f64> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        decode_rate(status, &body)
    }
}

#[async_trait]
impl RateSource for RateItClient {
    async fn rate(&self, route: &str) -> FeedResult<f64> {
        info!(source = "rateit", route = route, "Fetch rate");
        let url = self.rate_url(route)?;

        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Ok(rate) => return Ok(rate),
                Err(e) if e.is_transient() && self.retry.should_retry(attempt + 1) => {
                    attempt += 1;
                    let backoff = self.retry.delay(attempt);
                    let delay = e
                        .suggested_retry_delay()
                        .map_or(backoff, |suggested| suggested.max(backoff));
                    warn!(
                        route = route,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Rate request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Interpret an upstream response.
///
/// A structured error body wins over the status code; a non-2xx status
/// without one is reported as such.
fn decode_rate(status: u16, body: &[u8]) -> FeedResult<f64> {
    let parsed = serde_json::from_slice::<RateResponse>(body);

    if let Ok(rsp) = &parsed {
        if rsp.err_code != 0 {
            return Err(FeedError::Remote {
                code: rsp.err_code,
                message: rsp.err_message.clone(),
            });
        }
    }

    if !(200..300).contains(&status) {
        return Err(FeedError::Status(status));
    }

    parsed?
        .rate
        .ok_or_else(|| FeedError::Decode("missing rate field".to_string()))
}
