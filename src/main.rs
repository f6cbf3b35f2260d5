//! Feed Accumulator: binary entrypoint
//! Fetches every configured source once, merges new items into the per-source
//! stores, updates the run ledger and re-renders the dashboard.
//!
//! Exits non-zero only when the run as a whole cannot proceed (config or
//! ledger trouble). Individual source failures are logged and skipped.

use anyhow::{Context, Result};
use feed_accumulator::clock::{Clock, SystemClock};
use feed_accumulator::config::{self, AccumulatorConfig};
use feed_accumulator::dashboard::{self, DisplayZone};
use feed_accumulator::ingest::http::HttpFetcher;
use feed_accumulator::metrics::Metrics;
use feed_accumulator::{init_tracing, run_once, RunLedger};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::from_env()?;

    let cfg = config::load_default().context("loading accumulator config")?;
    tracing::info!(
        target: "feed_accumulator",
        sources = cfg.sources.len(),
        feeds_dir = %cfg.feeds_dir.display(),
        "starting accumulation run"
    );

    let fetcher = HttpFetcher::new(&cfg.user_agent)?
        .with_timeout(cfg.fetch_timeout_secs)
        .with_attempts(cfg.fetch_attempts);
    let clock = SystemClock;

    let summary = run_once(&cfg, &fetcher, &clock).await?;
    let failed = summary.failed().count();
    tracing::info!(
        target: "feed_accumulator",
        succeeded = summary.succeeded().count(),
        failed,
        new_items = summary.new_items(),
        "accumulation run finished"
    );

    if let Err(e) = render_dashboard(&cfg, &clock).await {
        tracing::warn!(target: "dashboard", error = ?e, "dashboard not updated");
    }

    if let Some(m) = &metrics {
        if let Err(e) = m.write_snapshot().await {
            tracing::warn!(target: "feed_accumulator", error = ?e, "metrics snapshot failed");
        }
    }

    Ok(())
}

async fn render_dashboard(cfg: &AccumulatorConfig, clock: &dyn Clock) -> Result<()> {
    let ledger = RunLedger::load(&cfg.ledger_path).await?;
    let zone = DisplayZone {
        offset: cfg.utc_offset(),
        label: cfg.timezone_label.clone(),
    };
    dashboard::render_to_file(
        &ledger,
        &cfg.template_path,
        &cfg.dashboard_path,
        &zone,
        clock.now(),
    )
    .await?;
    Ok(())
}
