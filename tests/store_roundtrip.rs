// tests/store_roundtrip.rs
use chrono::{FixedOffset, TimeZone, Utc};
use feed_accumulator::ingest::normalize::parse_bytes;
use feed_accumulator::persist;
use feed_accumulator::store::merge::merge;
use feed_accumulator::store::sort::sort_newest_first;
use feed_accumulator::store::xml::{from_xml, to_xml};
use feed_accumulator::FeedStore;

fn fixture_store() -> FeedStore {
    let bytes = std::fs::read("tests/fixtures/fetchrss.xml").expect("fixture");
    let feed = parse_bytes(&bytes).unwrap();
    let mut store = FeedStore::create(&feed.channel);
    merge(&mut store, &feed.entries);
    sort_newest_first(&mut store);
    store
}

#[tokio::test]
async fn written_store_loads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeds/harbour-ferry-updates.xml");

    let mut store = fixture_store();
    let now = Utc.with_ymd_and_hms(2024, 1, 4, 10, 0, 0).unwrap();
    store.touch_build_time(now, FixedOffset::east_opt(8 * 3600).unwrap());

    persist::write_atomic(&path, &to_xml(&store, "rss-style.xsl").unwrap())
        .await
        .unwrap();
    let back = from_xml(&std::fs::read(&path).unwrap()).unwrap();

    assert_eq!(back.channel(), store.channel());
    assert_eq!(back.items(), store.items());
    assert_eq!(
        back.channel().last_build_time.as_deref(),
        Some("Thu, 04 Jan 2024 18:00:00 +0800")
    );
    assert_eq!(
        back.identities().collect::<Vec<_>>(),
        vec!["hf-1003", "hf-1002", "hf-1001"]
    );
    // only the first media reference is kept
    assert_eq!(
        back.items()[1].media.as_ref().map(|m| m.url.as_str()),
        Some("https://cdn.example.test/img/1002.png")
    );
}

#[test]
fn merging_into_a_loaded_store_is_idempotent() {
    let store = fixture_store();
    let xml = to_xml(&store, "rss-style.xsl").unwrap();

    let mut loaded = from_xml(&xml).unwrap();
    let feed = parse_bytes(&std::fs::read("tests/fixtures/fetchrss.xml").unwrap()).unwrap();
    let outcome = merge(&mut loaded, &feed.entries);

    assert_eq!(outcome.new_items, 0);
    assert_eq!(outcome.already_present, 3);
    assert_eq!(loaded.len(), 3);
}

#[test]
fn serialized_text_is_escaped() {
    let store = fixture_store();
    let text = String::from_utf8(to_xml(&store, "a&b.xsl").unwrap()).unwrap();
    assert!(text.contains("href=\"a&amp;b.xsl\""));
    assert!(text.contains("New pier opens &amp; timetable changes"));
    assert!(text.contains("&lt;p&gt;Sailings every 30&amp;nbsp;min"));
}
