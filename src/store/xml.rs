// src/store/xml.rs
//! RSS 2.0 rendition of a [`FeedStore`].
//!
//! Writing always yields a complete document, also for a store without
//! items. Reading goes through the same parser used for upstream payloads,
//! so anything this module writes can be loaded back.

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use crate::ingest::normalize;
use crate::store::identity;
use crate::store::{FeedStore, Item, StoreChannel, UNTITLED_FEED};

pub const GENERATOR: &str = "Feed Accumulator";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_MEDIA: &str = "http://search.yahoo.com/mrss/";

/// Serialize the store, items in their current order.
pub fn to_xml(store: &FeedStore, stylesheet_href: &str) -> Result<Vec<u8>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let pi = format!(
        r#"xml-stylesheet type="text/xsl" href="{}""#,
        quick_xml::escape::escape(stylesheet_href)
    );
    w.write_event(Event::PI(BytesPI::new(pi.as_str())))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:dc", NS_DC));
    rss.push_attribute(("xmlns:media", NS_MEDIA));
    w.write_event(Event::Start(rss))?;
    w.write_event(Event::Start(BytesStart::new("channel")))?;

    let ch = store.channel();
    write_text_element(&mut w, "title", &ch.title)?;
    write_text_element(&mut w, "description", &ch.description)?;
    write_text_element(&mut w, "link", &ch.link)?;
    if let Some(ts) = &ch.last_build_time {
        write_text_element(&mut w, "lastBuildDate", ts)?;
    }
    write_text_element(&mut w, "generator", GENERATOR)?;
    if let Some(url) = &ch.image_url {
        w.write_event(Event::Start(BytesStart::new("image")))?;
        write_text_element(&mut w, "url", url)?;
        write_text_element(&mut w, "title", &ch.title)?;
        write_text_element(&mut w, "link", &ch.link)?;
        w.write_event(Event::End(BytesEnd::new("image")))?;
    }

    for it in store.items() {
        write_item(&mut w, it)?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))?;
    w.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut out = w.into_inner();
    out.push(b'\n');
    Ok(out)
}

fn write_item<W: Write>(w: &mut Writer<W>, it: &Item) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    for (name, value) in [
        ("title", &it.title),
        ("link", &it.link),
        ("description", &it.description),
        ("dc:creator", &it.author),
        ("pubDate", &it.published),
    ] {
        if let Some(v) = value {
            write_text_element(w, name, v)?;
        }
    }
    if let Some(media) = &it.media {
        let mut el = BytesStart::new("media:content");
        el.push_attribute(("url", sanitize_text(&media.url).as_str()));
        if let Some(kind) = &media.kind {
            el.push_attribute(("medium", sanitize_text(kind).as_str()));
        }
        w.write_event(Event::Empty(el))?;
    }
    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    w.write_event(Event::Start(guid))?;
    w.write_event(Event::Text(BytesText::new(&sanitize_text(it.identity()))))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;
    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&sanitize_text(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

// Control characters other than tab/LF/CR are not allowed anywhere in XML 1.0.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c as u32) >= 0x20)
        .collect()
}

/// Load a store previously written by [`to_xml`].
///
/// Items are kept in document order. Items lacking a guid fall back to their
/// link; items with neither are dropped with a warning.
pub fn from_xml(bytes: &[u8]) -> Result<FeedStore> {
    let doc = normalize::parse_bytes(bytes).context("parsing stored feed")?;
    let mut store = FeedStore::with_channel(StoreChannel {
        title: doc
            .channel
            .title
            .unwrap_or_else(|| UNTITLED_FEED.to_string()),
        description: doc.channel.description.unwrap_or_default(),
        link: doc.channel.link.unwrap_or_default(),
        last_build_time: doc.channel.last_build,
        image_url: doc.channel.image_url,
    });
    for entry in &doc.entries {
        match identity::resolve(entry) {
            Ok(id) => {
                store.insert(Item::from_entry(id, entry));
            }
            Err(e) => {
                tracing::warn!(target: "store", "dropping stored item: {e}");
            }
        }
    }
    Ok(store)
}
