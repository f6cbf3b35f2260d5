//! Drop ledger records for sources that are no longer configured.
//! Store files are left on disk.

use anyhow::{Context, Result};
use feed_accumulator::config;
use feed_accumulator::{init_tracing, RunLedger};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading accumulator config")?;
    let mut ledger = RunLedger::load(&cfg.ledger_path).await?;

    let removed = ledger.prune(&cfg.source_urls());
    if removed > 0 {
        ledger.save(&cfg.ledger_path).await?;
    }
    tracing::info!(
        target: "ledger",
        removed,
        remaining = ledger.len(),
        path = %cfg.ledger_path.display(),
        "ledger pruned"
    );
    println!("pruned {removed} record(s), {} remaining", ledger.len());
    Ok(())
}
