// src/store/merge.rs
use crate::ingest::types::Entry;
use crate::store::identity;
use crate::store::{FeedStore, Item};

/// Counts from one merge call. `new_items` is what run statistics report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub new_items: usize,
    pub already_present: usize,
    pub unidentifiable: usize,
}

/// Insert every entry whose identity the store has not seen, in the order the
/// normalizer supplied them. Re-merging the same entries is a no-op.
///
/// Channel metadata is left alone; entries without an identity are skipped
/// with a warning and do not stop the merge.
pub fn merge(store: &mut FeedStore, entries: &[Entry]) -> MergeOutcome {
    let mut out = MergeOutcome::default();
    for (pos, entry) in entries.iter().enumerate() {
        let id = match identity::resolve(entry) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    target: "store",
                    position = pos,
                    title = entry.title.as_deref().unwrap_or_default(),
                    "skipping entry: {e}"
                );
                out.unidentifiable += 1;
                continue;
            }
        };
        if store.contains(&id) {
            out.already_present += 1;
            continue;
        }
        if store.insert(Item::from_entry(id, entry)) {
            out.new_items += 1;
        }
    }
    out
}
