// src/store/sort.rs
//! Newest-first ordering by publish date.
//!
//! Dates are read with the RFC-822 grammar (`Tue, 02 Jan 2024 10:00:00 +0000`).
//! Missing or unparsable dates resolve to [`UNPARSABLE`] and therefore sink to
//! the end. The sort is stable, so ties keep their relative order.

use std::cmp::Reverse;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::store::{FeedStore, Item};

/// Timestamp assigned to items whose date cannot be read.
pub const UNPARSABLE: i64 = i64::MIN;

/// Unix seconds for RFC-822 text. Named zones (`GMT`, `EST`, ...) that the
/// strict parser rejects get a second, lenient attempt.
pub fn parse_rfc822(text: &str) -> Option<i64> {
    let t = text.trim();
    OffsetDateTime::parse(t, &Rfc2822)
        .map(|dt| dt.unix_timestamp())
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc2822(t)
                .ok()
                .map(|dt| dt.timestamp())
        })
}

pub fn resolved_timestamp(item: &Item) -> i64 {
    item.published
        .as_deref()
        .and_then(parse_rfc822)
        .unwrap_or(UNPARSABLE)
}

/// Reorder the whole store newest-first. Runs after every merge.
pub fn sort_newest_first(store: &mut FeedStore) {
    store
        .items_mut()
        .sort_by_cached_key(|it| Reverse(resolved_timestamp(it)));
}
