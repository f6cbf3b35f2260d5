use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};

use crate::persist;

pub const ENV_METRICS_SNAPSHOT_PATH: &str = "METRICS_SNAPSHOT_PATH";

/// Prometheus recorder whose exposition text is dumped to a file when the
/// process is done, since a batch run has nothing to scrape.
pub struct Metrics {
    pub handle: PrometheusHandle,
    snapshot_path: PathBuf,
}

impl Metrics {
    /// Install the global recorder if `METRICS_SNAPSHOT_PATH` is set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ENV_METRICS_SNAPSHOT_PATH) {
            Ok(p) if !p.trim().is_empty() => Self::init(PathBuf::from(p)).map(Some),
            _ => Ok(None),
        }
    }

    pub fn init(snapshot_path: PathBuf) -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        gauge!("process_start_ts").set(chrono::Utc::now().timestamp() as f64);

        Ok(Self {
            handle,
            snapshot_path,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Render the exposition text and write it atomically.
    pub async fn write_snapshot(&self) -> Result<()> {
        let text = self.handle.render();
        persist::write_atomic(&self.snapshot_path, text.as_bytes())
            .await
            .with_context(|| format!("writing metrics to {}", self.snapshot_path.display()))?;
        tracing::debug!(target: "metrics", path = %self.snapshot_path.display(), "metrics snapshot written");
        Ok(())
    }
}
