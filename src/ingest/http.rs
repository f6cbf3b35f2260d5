// src/ingest/http.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use std::time::Duration;

use crate::ingest::types::FeedFetcher;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retrying after failed attempt number `attempt` (1-based):
/// 500ms, 1s, 2s, ... capped at 30s.
pub fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(16);
    Duration::from_millis((BASE_BACKOFF_MS << shift).min(MAX_BACKOFF_MS))
}

/// Fetches feed payloads over HTTP(S).
///
/// Non-2xx responses count as failures. Failed attempts are retried with
/// [`backoff`] delays up to `max_attempts` total.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(30),
            max_attempts: 1,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("http get()")?;
        let resp = resp.error_for_status().context("http status")?;
        let body = resp.bytes().await.context("http .bytes()")?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    counter!("ingest_fetch_errors_total").increment(1);
                    if attempt < self.max_attempts {
                        tracing::debug!(target: "ingest", url, attempt, error = %format!("{e:#}"), "fetch retry");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("fetching {url} failed after {attempt} attempt(s): {e:#}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
