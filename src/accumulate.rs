//! # Accumulation run
//! For every configured source, in order:
//! fetch → normalize → load-or-create store → merge → sort → stamp build
//! time → atomic write → ledger upsert.
//!
//! A failing source is logged and skipped. Its store file and ledger record
//! stay exactly as they were; the other sources are unaffected.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

use crate::clock::Clock;
use crate::config::AccumulatorConfig;
use crate::ingest::types::FeedFetcher;
use crate::ingest::{self, IngestError};
use crate::ledger::{RunLedger, RunRecord, RunStatus};
use crate::persist;
use crate::slug;
use crate::store::merge::{merge, MergeOutcome};
use crate::store::sort::sort_newest_first;
use crate::store::{xml, FeedStore, UNTITLED_FEED};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("accumulate_sources_total", "Sources processed.");
        describe_counter!(
            "accumulate_source_failures_total",
            "Sources skipped because fetch, parse, load or write failed."
        );
        describe_counter!("accumulate_new_items_total", "Items added to stores.");
        describe_counter!(
            "accumulate_skipped_entries_total",
            "Entries dropped for lacking an id and a link."
        );
        describe_gauge!(
            "accumulate_last_run_ts",
            "Unix ts when the accumulation run last finished."
        );
    });
}

#[derive(Debug, thiserror::Error)]
pub enum SourceFailure {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("existing store {} is unreadable: {error:#}", .path.display())]
    Load { path: PathBuf, error: anyhow::Error },
    #[error("writing store {} failed: {error:#}", .path.display())]
    Persist { path: PathBuf, error: anyhow::Error },
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_url: String,
    pub title: String,
    pub slug: String,
    pub store_path: PathBuf,
    pub created: bool,
    pub merge: MergeOutcome,
    pub total_items: usize,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source_url: String,
    pub result: Result<SourceReport, SourceFailure>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<SourceOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &SourceReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &SourceFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source_url.as_str(), e)))
    }

    pub fn new_items(&self) -> usize {
        self.succeeded().map(|r| r.merge.new_items).sum()
    }
}

pub struct Accumulator<'a> {
    cfg: &'a AccumulatorConfig,
    fetcher: &'a dyn FeedFetcher,
    clock: &'a dyn Clock,
}

impl<'a> Accumulator<'a> {
    pub fn new(
        cfg: &'a AccumulatorConfig,
        fetcher: &'a dyn FeedFetcher,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            cfg,
            fetcher,
            clock,
        }
    }

    /// Process every configured source sequentially, then stamp the ledger's
    /// `last_run`. Never fails as a whole; per-source errors are in the summary.
    pub async fn run(&self, ledger: &mut RunLedger) -> RunSummary {
        ensure_metrics_described();
        let mut outcomes = Vec::with_capacity(self.cfg.sources.len());

        for src in &self.cfg.sources {
            let url = src.url.as_str();
            counter!("accumulate_sources_total").increment(1);
            let result = self.process_source(url, ledger).await;
            match &result {
                Ok(r) => tracing::info!(
                    target: "accumulate",
                    url,
                    slug = %r.slug,
                    created = r.created,
                    new = r.merge.new_items,
                    total = r.total_items,
                    "source accumulated"
                ),
                Err(e) => {
                    counter!("accumulate_source_failures_total").increment(1);
                    tracing::warn!(target: "accumulate", url, error = %e, "source skipped");
                }
            }
            outcomes.push(SourceOutcome {
                source_url: url.to_string(),
                result,
            });
        }

        let finished_at = self.clock.now();
        ledger.touch_last_run(finished_at);
        gauge!("accumulate_last_run_ts").set(finished_at.timestamp() as f64);

        RunSummary {
            outcomes,
            finished_at,
        }
    }

    /// One source end to end. The ledger is only touched after the store has
    /// been written successfully.
    pub async fn process_source(
        &self,
        url: &str,
        ledger: &mut RunLedger,
    ) -> Result<SourceReport, SourceFailure> {
        let feed = ingest::fetch_and_normalize(self.fetcher, url).await?;

        let title = feed
            .channel
            .title
            .clone()
            .unwrap_or_else(|| UNTITLED_FEED.to_string());
        let slug = self.claim_slug(ledger, url, &title).await;
        let path = self.cfg.store_path(&slug);

        let existing = persist::read_optional(&path)
            .await
            .and_then(|bytes| bytes.map(|b| xml::from_xml(&b)).transpose())
            .map_err(|error| SourceFailure::Load {
                path: path.clone(),
                error,
            })?;
        let created = existing.is_none();
        let mut store = existing.unwrap_or_else(|| FeedStore::create(&feed.channel));
        if let Some(image) = &self.cfg.channel_image_url {
            store.set_image_url(image.as_str());
        }

        let outcome = merge(&mut store, &feed.entries);
        sort_newest_first(&mut store);
        let now = self.clock.now();
        store.touch_build_time(now, self.cfg.utc_offset());

        let persisted = match xml::to_xml(&store, &self.cfg.stylesheet_href) {
            Ok(bytes) => persist::write_atomic(&path, &bytes).await,
            Err(e) => Err(e),
        };
        persisted.map_err(|error| SourceFailure::Persist {
            path: path.clone(),
            error,
        })?;

        counter!("accumulate_new_items_total").increment(outcome.new_items as u64);
        counter!("accumulate_skipped_entries_total").increment(outcome.unidentifiable as u64);

        ledger.upsert(
            RunRecord {
                title: title.clone(),
                slug: slug.clone(),
                source_url: url.to_string(),
                published_feed_url: self.cfg.published_feed_url(&slug),
                description: feed.channel.description.clone().unwrap_or_default(),
                link: feed.channel.link.clone().unwrap_or_default(),
                last_updated: now,
                status: RunStatus::Success,
                total_items: store.len(),
                new_items_this_run: outcome.new_items,
                extra: Default::default(),
            },
            now,
        );

        Ok(SourceReport {
            source_url: url.to_string(),
            title,
            slug,
            store_path: path,
            created,
            merge: outcome,
            total_items: store.len(),
        })
    }

    /// Store slug for `url`. A source keeps the slug its ledger record already
    /// carries, whatever its title does later. A new source derives one from
    /// the title and disambiguates it when another record owns it or a store
    /// file of that name is already on disk.
    async fn claim_slug(&self, ledger: &RunLedger, url: &str, title: &str) -> String {
        if let Some(rec) = ledger.get(url).filter(|r| !r.slug.is_empty()) {
            return rec.slug.clone();
        }
        let base = slug::slug_for_source(title, url);
        let owned_by_other = ledger
            .records()
            .iter()
            .any(|r| r.slug == base && r.source_url != url);
        let orphan_file = tokio::fs::try_exists(self.cfg.store_path(&base))
            .await
            .unwrap_or(true);
        if owned_by_other || orphan_file {
            let slug = slug::disambiguate(&base, url);
            tracing::info!(target: "accumulate", url, base = %base, slug = %slug, "slug already in use");
            slug
        } else {
            base
        }
    }
}

/// Load the ledger, accumulate all sources, save the ledger.
///
/// Fails only when the ledger itself cannot be read or written; an unreadable
/// ledger aborts before any store is touched.
pub async fn run_once(
    cfg: &AccumulatorConfig,
    fetcher: &dyn FeedFetcher,
    clock: &dyn Clock,
) -> anyhow::Result<RunSummary> {
    let mut ledger = RunLedger::load(&cfg.ledger_path).await?;
    let summary = Accumulator::new(cfg, fetcher, clock).run(&mut ledger).await;
    ledger.save(&cfg.ledger_path).await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ingest::fixture::StaticFetcher;
    use chrono::TimeZone;

    const URL: &str = "https://example.test/a.xml";

    fn rss(title: &str, items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(id, date)| {
                format!("<item><title>{id}</title><guid>{id}</guid><pubDate>{date}</pubDate></item>")
            })
            .collect();
        format!("<rss version=\"2.0\"><channel><title>{title}</title>{body}</channel></rss>")
    }

    #[tokio::test]
    async fn scenario_three_entries_sorted_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AccumulatorConfig::new([URL]).rooted_at(dir.path());
        let fetcher = StaticFetcher::new().with_body(
            URL,
            rss(
                "Alpha",
                &[
                    ("3", "Wed, 03 Jan 2024 00:00:00 +0000"),
                    ("1", "Mon, 01 Jan 2024 00:00:00 +0000"),
                    ("2", "Tue, 02 Jan 2024 00:00:00 +0000"),
                ],
            ),
        );
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());
        let mut ledger = RunLedger::default();

        let report = Accumulator::new(&cfg, &fetcher, &clock)
            .process_source(URL, &mut ledger)
            .await
            .unwrap();
        assert!(report.created);
        assert_eq!(report.merge.new_items, 3);
        assert_eq!(report.slug, "alpha");

        let stored = xml::from_xml(&std::fs::read(&report.store_path).unwrap()).unwrap();
        assert_eq!(stored.identities().collect::<Vec<_>>(), vec!["3", "2", "1"]);
        assert_eq!(ledger.get(URL).unwrap().total_items, stored.len());
    }

    fn record(url: &str, slug: &str) -> RunRecord {
        RunRecord {
            title: "News".into(),
            slug: slug.into(),
            source_url: url.into(),
            published_feed_url: String::new(),
            description: String::new(),
            link: String::new(),
            last_updated: Utc::now(),
            status: RunStatus::Success,
            total_items: 0,
            new_items_this_run: 0,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn slug_is_sticky_and_never_reuses_a_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AccumulatorConfig::new([URL]).rooted_at(dir.path());
        let fetcher = StaticFetcher::new();
        let clock = FixedClock(Utc::now());
        let acc = Accumulator::new(&cfg, &fetcher, &clock);

        let mut ledger = RunLedger::default();
        ledger.upsert(record("https://other.test/rss", "news"), Utc::now());
        assert_eq!(
            acc.claim_slug(&ledger, "https://other.test/rss", "Renamed").await,
            "news"
        );
        let ours = acc.claim_slug(&ledger, URL, "News").await;
        assert_ne!(ours, "news");
        assert!(ours.starts_with("news-"));

        // a leftover file with no owner still blocks the name
        std::fs::create_dir_all(&cfg.feeds_dir).unwrap();
        std::fs::write(cfg.store_path("daily"), "<rss/>").unwrap();
        assert_ne!(acc.claim_slug(&RunLedger::default(), URL, "Daily").await, "daily");
        assert_eq!(acc.claim_slug(&RunLedger::default(), URL, "Weekly").await, "weekly");
    }
}
