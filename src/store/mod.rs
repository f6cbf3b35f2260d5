// src/store/mod.rs
//! # Feed Store
//! One accumulated feed: channel metadata plus a collection of items in
//! which every identity occurs at most once.
//!
//! Item order carries no meaning until [`sort::sort_newest_first`] runs; the
//! serializer writes whatever order the store holds.

pub mod identity;
pub mod merge;
pub mod sort;
pub mod xml;

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashSet;

use crate::ingest::types::{ChannelMeta, Entry, MediaRef};

pub const UNTITLED_FEED: &str = "Untitled Feed";

/// strftime form of the RFC-822 date grammar used for every stored timestamp.
pub const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChannel {
    pub title: String,
    pub description: String,
    pub link: String,
    pub last_build_time: Option<String>,
    pub image_url: Option<String>,
}

/// Durable form of an accepted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    identity: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub media: Option<MediaRef>,
}

impl Item {
    /// Copy the normalized fields of `entry`. Description falls back to the
    /// summary, publish date to the updated date, media to the first reference.
    pub fn from_entry(identity: String, entry: &Entry) -> Self {
        Self {
            identity,
            title: entry.title.clone(),
            link: entry.link.clone(),
            description: entry.description.clone().or_else(|| entry.summary.clone()),
            author: entry.author.clone(),
            published: entry.published.clone().or_else(|| entry.updated.clone()),
            media: entry.media.first().cloned(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    channel: StoreChannel,
    items: Vec<Item>,
    index: HashSet<String>,
}

impl FeedStore {
    /// Fresh store for a source seen for the first time.
    pub fn create(meta: &ChannelMeta) -> Self {
        Self::with_channel(StoreChannel {
            title: meta
                .title
                .clone()
                .unwrap_or_else(|| UNTITLED_FEED.to_string()),
            description: meta.description.clone().unwrap_or_default(),
            link: meta.link.clone().unwrap_or_default(),
            last_build_time: None,
            image_url: meta.image_url.clone(),
        })
    }

    pub fn with_channel(channel: StoreChannel) -> Self {
        Self {
            channel,
            items: Vec::new(),
            index: HashSet::new(),
        }
    }

    pub fn channel(&self) -> &StoreChannel {
        &self.channel
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(|it| it.identity.as_str())
    }

    /// Insert unless an item with the same identity is already stored.
    pub fn insert(&mut self, item: Item) -> bool {
        if !self.index.insert(item.identity.clone()) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Stamp the build time in the configured local zone.
    pub fn touch_build_time(&mut self, now: DateTime<Utc>, offset: FixedOffset) {
        self.channel.last_build_time =
            Some(now.with_timezone(&offset).format(RFC822_FORMAT).to_string());
    }

    /// Channel artwork; written as the `<image>` block.
    pub fn set_image_url(&mut self, url: impl Into<String>) {
        self.channel.image_url = Some(url.into());
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }
}
