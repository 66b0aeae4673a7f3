//! HTTPS dispatch with bearer auth and bounded exponential-backoff retry.
//!
//! Grounded on `original_source/edge_runtime_v2.py`'s `post_with_retry` and on
//! the teacher's `scrapers::dome_rest::DomeRestClient` for the
//! `reqwest::Client` construction style (timeout, bearer header baked into
//! the client at build time).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use crate::config::BackoffConfig;

#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    cloud_url: String,
    backoff: BackoffConfig,
}

impl Dispatcher {
    pub fn new(cloud_url: impl Into<String>, edge_token: &str, backoff: BackoffConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(reqwest::header::AUTHORIZATION, format!("Bearer {edge_token}").parse().context("invalid edge token")?);
                headers
            })
            .build()
            .context("building dispatcher http client")?;
        Ok(Self { client, cloud_url: cloud_url.into(), backoff })
    }

    /// POST `body` to `path` (relative to `cloud_url`), retrying with
    /// `min(base * multiplier^attempt, max)` delays up to
    /// `backoff.max_retries` times. Returns `Ok(true)` on any 2xx response,
    /// `Ok(false)` once the retry budget is exhausted without success.
    /// Transport failures never propagate as errors here — a down cloud
    /// endpoint must not tear down the dispatcher task.
    pub async fn post_with_retry<T: Serialize>(&self, path: &str, body: &T) -> Result<bool> {
        let url = format!("{}{}", self.cloud_url.trim_end_matches('/'), path);
        for attempt in 0..self.backoff.max_retries {
            match self.client.post(&url).json(body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(true),
                Ok(resp) => warn!(%url, status = %resp.status(), "dispatch attempt rejected"),
                Err(e) => warn!(%url, error = %e, "dispatch attempt failed"),
            }
            tokio::time::sleep(Duration::from_millis(self.backoff.delay_ms(attempt))).await;
        }
        Ok(false)
    }
}
