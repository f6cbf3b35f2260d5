// src/ingest/types.rs
use anyhow::Result;

/// First media attachment of an entry (`media:content`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub kind: Option<String>, // the `medium` attribute, e.g. "image"
}

/// One normalized unit of upstream content, not yet persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>, // raw RFC-822 text
    pub updated: Option<String>,
    pub media: Vec<MediaRef>,
}

/// Channel-level metadata as delivered by the upstream document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub last_build: Option<String>,
    /// RSS `<image><url>` or Atom `<logo>`.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFeed {
    pub channel: ChannelMeta,
    pub entries: Vec<Entry>,
}

/// Retrieval seam: turns a configured source URL into raw payload bytes.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}
