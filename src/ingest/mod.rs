// src/ingest/mod.rs
pub mod fixture;
pub mod http;
pub mod normalize;
pub mod types;

use crate::ingest::types::{FeedFetcher, NormalizedFeed};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the snapshot).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from fetched feeds.");
        describe_counter!(
            "ingest_fetch_errors_total",
            "Failed fetch attempts (including retried ones)."
        );
        describe_counter!(
            "ingest_normalize_errors_total",
            "Payloads that could not be parsed as RSS/Atom."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Why a source produced nothing usable this run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("normalization failed: {0:#}")]
    Normalize(anyhow::Error),
    #[error("feed returned no entries")]
    Empty,
}

/// Parse raw payload bytes, recording parse time and entry counts.
pub fn normalize_payload(bytes: &[u8]) -> anyhow::Result<NormalizedFeed> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let feed = normalize::parse_bytes(bytes)?;
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_entries_total").increment(feed.entries.len() as u64);
    Ok(feed)
}

/// Fetch one source and normalize it. An empty entry list is a failure too:
/// the caller must leave that source's prior state untouched.
pub async fn fetch_and_normalize(
    fetcher: &dyn FeedFetcher,
    url: &str,
) -> Result<NormalizedFeed, IngestError> {
    ensure_metrics_described();
    let body = fetcher.fetch(url).await.map_err(IngestError::Fetch)?;
    let feed = normalize_payload(&body).map_err(|e| {
        counter!("ingest_normalize_errors_total").increment(1);
        IngestError::Normalize(e)
    })?;
    if feed.entries.is_empty() {
        return Err(IngestError::Empty);
    }
    tracing::debug!(
        target: "ingest",
        url,
        fetcher = fetcher.name(),
        entries = feed.entries.len(),
        "source normalized"
    );
    Ok(feed)
}
