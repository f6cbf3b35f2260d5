// src/config/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "FEED_ACCUMULATOR_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/feeds.toml";
pub const DEFAULT_JSON_PATH: &str = "config/feeds.json";

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

fn default_feeds_dir() -> PathBuf {
    PathBuf::from("feeds")
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("metadata/feed-status.json")
}
fn default_stylesheet_href() -> String {
    "rss-style.xsl".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_fetch_attempts() -> u8 {
    1
}
fn default_user_agent() -> String {
    concat!("feed-accumulator/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_dashboard_path() -> PathBuf {
    PathBuf::from("index.html")
}
fn default_template_path() -> PathBuf {
    PathBuf::from("template.html")
}
fn default_timezone_label() -> String {
    "UTC".to_string()
}

/// One configured upstream feed. Its URL is the stable source identifier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    #[serde(alias = "fetchrss_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccumulatorConfig {
    #[serde(alias = "feeds")]
    pub sources: Vec<SourceConfig>,
    /// Directory holding one accumulated `<slug>.xml` per source.
    #[serde(default = "default_feeds_dir")]
    pub feeds_dir: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Public location of `feeds_dir`, used for `published_feed_url`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_stylesheet_href")]
    pub stylesheet_href: String,
    /// Overrides the channel `<image>` of every store when set.
    #[serde(default)]
    pub channel_image_url: Option<String>,
    /// Fixed offset of the local time zone used for build timestamps.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u8,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: PathBuf,
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
}

impl AccumulatorConfig {
    /// Config with defaults for everything but the source list.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cfg = Self {
            sources: sources
                .into_iter()
                .map(|u| SourceConfig { url: u.into() })
                .collect(),
            feeds_dir: default_feeds_dir(),
            ledger_path: default_ledger_path(),
            public_base_url: None,
            stylesheet_href: default_stylesheet_href(),
            channel_image_url: None,
            utc_offset_minutes: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_attempts: default_fetch_attempts(),
            user_agent: default_user_agent(),
            dashboard_path: default_dashboard_path(),
            template_path: default_template_path(),
            timezone_label: default_timezone_label(),
        };
        cfg.sources = clean_sources(std::mem::take(&mut cfg.sources));
        cfg
    }

    /// Re-root every relative output path under `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        for p in [
            &mut self.feeds_dir,
            &mut self.ledger_path,
            &mut self.dashboard_path,
            &mut self.template_path,
        ] {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        }
        self
    }

    pub fn source_urls(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.url.as_str()).collect()
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn store_path(&self, slug: &str) -> PathBuf {
        self.feeds_dir.join(format!("{slug}.xml"))
    }

    pub fn published_feed_url(&self, slug: &str) -> String {
        match self.public_base_url.as_deref() {
            Some(base) => format!("{}/{slug}.xml", base.trim_end_matches('/')),
            None => self.store_path(slug).to_string_lossy().replace('\\', "/"),
        }
    }

    fn validate(mut self) -> Result<Self> {
        self.sources = clean_sources(self.sources);
        if self.sources.is_empty() {
            bail!("config contains no sources");
        }
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            bail!(
                "utc_offset_minutes {} is outside ±{MAX_OFFSET_MINUTES}",
                self.utc_offset_minutes
            );
        }
        self.fetch_attempts = self.fetch_attempts.max(1);
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AccumulatorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $FEED_ACCUMULATOR_CONFIG
/// 2) config/feeds.toml
/// 3) config/feeds.json
pub fn load_default() -> Result<AccumulatorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Err(anyhow!(
        "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AccumulatorConfig> {
    let cfg: AccumulatorConfig = match hint_ext {
        "json" => serde_json::from_str(s)?,
        "toml" => toml::from_str(s)?,
        // No usable extension: JSON documents start with '{'.
        _ if s.trim_start().starts_with('{') => serde_json::from_str(s)?,
        _ => toml::from_str(s)?,
    };
    cfg.validate()
}

/// Trim URLs, drop blanks and repeated sources (first occurrence wins).
fn clean_sources(items: Vec<SourceConfig>) -> Vec<SourceConfig> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.url.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(SourceConfig { url: t.to_string() });
        }
    }
    out
}
