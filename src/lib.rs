// src/lib.rs
// Public library surface shared by the binaries and the integration tests.

pub mod accumulate;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod persist;
pub mod slug;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::accumulate::{run_once, Accumulator, RunSummary, SourceFailure};
pub use crate::config::AccumulatorConfig;
pub use crate::ledger::{RunLedger, RunRecord, RunStatus};
pub use crate::store::FeedStore;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str =
    "accumulate=info,ingest=info,store=info,ledger=info,dashboard=info,feed_accumulator=info,warn";

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to [`DEFAULT_LOG_FILTER`].
/// `LOG_FORMAT=json` switches to one JSON object per line; anything else is
/// the compact human format. Calling twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
