//! Re-render the dashboard from the current ledger without fetching anything.

use anyhow::{Context, Result};
use feed_accumulator::clock::{Clock, SystemClock};
use feed_accumulator::config;
use feed_accumulator::dashboard::{self, DisplayZone};
use feed_accumulator::{init_tracing, RunLedger};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading accumulator config")?;
    let ledger = RunLedger::load(&cfg.ledger_path).await?;
    let zone = DisplayZone {
        offset: cfg.utc_offset(),
        label: cfg.timezone_label.clone(),
    };

    let feeds = dashboard::render_to_file(
        &ledger,
        &cfg.template_path,
        &cfg.dashboard_path,
        &zone,
        SystemClock.now(),
    )
    .await?;

    println!("dashboard: {} feeds -> {}", feeds, cfg.dashboard_path.display());
    Ok(())
}
