// src/store/identity.rs
use crate::ingest::types::Entry;

/// An entry with neither an id nor a link cannot be deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("entry has no stable identity")]
pub struct MissingIdentity;

/// Canonical deduplication key: the feed-supplied id, else the link.
/// Blank values count as absent.
pub fn resolve(entry: &Entry) -> Result<String, MissingIdentity> {
    non_blank(entry.id.as_deref())
        .or_else(|| non_blank(entry.link.as_deref()))
        .map(str::to_string)
        .ok_or(MissingIdentity)
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
