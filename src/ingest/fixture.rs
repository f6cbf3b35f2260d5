// src/ingest/fixture.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::ingest::types::FeedFetcher;

/// In-memory fetcher: each URL maps to a canned body or a canned failure.
/// Unknown URLs fail like an unreachable host would.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    responses: HashMap<String, std::result::Result<Vec<u8>, String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.responses.insert(url.to_string(), Err(reason.to_string()));
        self
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(anyhow!("{reason}")),
            None => Err(anyhow!("no fixture registered for {url}")),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
