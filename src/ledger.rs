//! # Run Ledger
//! Cross-source record of run outcomes, persisted as
//! `{ "feeds": [RunRecord...], "last_run": <RFC 3339> }`.
//!
//! Records are keyed by source URL and keep first-seen order. The dashboard
//! reads this file, so field names are part of a stable schema; older key
//! names (`fetchrss_url`, `accumulated_url`, `total_posts`,
//! `new_posts_this_run`) are still accepted on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::persist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub title: String,
    pub slug: String,
    #[serde(alias = "fetchrss_url")]
    pub source_url: String,
    #[serde(alias = "accumulated_url")]
    pub published_feed_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    pub last_updated: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(alias = "total_posts")]
    pub total_items: usize,
    #[serde(alias = "new_posts_this_run")]
    pub new_items_this_run: usize,
    /// Keys this crate does not know about, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunRecord {
    /// Field-wise overwrite: every typed field is replaced, extra keys from
    /// `newer` win over existing ones and the rest are kept.
    fn overwrite_from(&mut self, newer: RunRecord) {
        let mut extra = std::mem::take(&mut self.extra);
        extra.extend(newer.extra);
        *self = RunRecord { extra, ..newer };
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDoc {
    #[serde(default)]
    feeds: Vec<RunRecord>,
    #[serde(default)]
    last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    records: Vec<RunRecord>,
    index: HashMap<String, usize>,
    last_run: Option<DateTime<Utc>>,
}

impl RunLedger {
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn get(&self, source_url: &str) -> Option<&RunRecord> {
        self.index.get(source_url).map(|&i| &self.records[i])
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.records.iter().map(|r| r.total_items).sum()
    }

    /// Replace the record for `record.source_url` or append a new one, then
    /// stamp `last_run`.
    pub fn upsert(&mut self, record: RunRecord, now: DateTime<Utc>) {
        self.put(record);
        self.touch_last_run(now);
    }

    pub fn touch_last_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
    }

    fn put(&mut self, record: RunRecord) {
        match self.index.get(&record.source_url) {
            Some(&i) => self.records[i].overwrite_from(record),
            None => {
                self.index
                    .insert(record.source_url.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Drop records whose source is no longer configured. Returns how many
    /// were removed.
    pub fn prune<S: AsRef<str>>(&mut self, configured: &[S]) -> usize {
        let keep: HashSet<&str> = configured.iter().map(AsRef::as_ref).collect();
        let before = self.records.len();
        self.records.retain(|r| keep.contains(r.source_url.as_str()));
        self.reindex();
        before - self.records.len()
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.source_url.clone(), i))
            .collect();
    }

    /// Parse ledger JSON. Blank input is an empty ledger. Repeated source
    /// URLs fold into the first occurrence.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let doc: LedgerDoc = serde_json::from_slice(bytes).context("parsing run ledger json")?;
        let mut ledger = Self {
            last_run: doc.last_run,
            ..Self::default()
        };
        for r in doc.feeds {
            ledger.put(r);
        }
        Ok(ledger)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct Out<'a> {
            feeds: &'a [RunRecord],
            last_run: Option<DateTime<Utc>>,
        }
        let mut out = serde_json::to_vec_pretty(&Out {
            feeds: &self.records,
            last_run: self.last_run,
        })?;
        out.push(b'\n');
        Ok(out)
    }

    /// Missing file → empty ledger.
    pub async fn load(path: &Path) -> Result<Self> {
        match persist::read_optional(path).await? {
            Some(bytes) => {
                Self::from_json(&bytes).with_context(|| format!("loading {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_json_pretty()?;
        persist::write_atomic(path, &bytes).await?;
        tracing::debug!(target: "ledger", path = %path.display(), records = self.len(), "ledger saved");
        Ok(())
    }
}
