// src/ingest/normalize.rs
//! Turns an RSS 2.0 (or RSS 1.0) / Atom document into a [`NormalizedFeed`].
//!
//! Elements are matched by local name, so `dc:creator`, `media:content` and
//! `atom:updated` are recognised regardless of the prefix a publisher picked.
//! Text goes through a full HTML entity decoder instead of the strict XML one:
//! scraped feeds routinely carry `&nbsp;` and friends. Atom `type="xhtml"`
//! bodies are re-serialized as HTML markup without their wrapping `<div>`.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{ChannelMeta, Entry, MediaRef, NormalizedFeed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Rss,
    Atom,
}

#[derive(Debug)]
struct Frame {
    name: String,
    media: bool,
}

#[derive(Debug, Default)]
struct DocParser {
    kind: Option<DocKind>,
    stack: Vec<Frame>,
    text: String,
    channel: ChannelMeta,
    entries: Vec<Entry>,
    current: Option<Entry>,
    /// Stack depth of an open Atom xhtml container, if any.
    xhtml: Option<usize>,
}

/// Parse a feed document from UTF-8 bytes.
pub fn parse_bytes(bytes: &[u8]) -> Result<NormalizedFeed> {
    let xml = std::str::from_utf8(bytes).context("feed payload is not valid UTF-8")?;
    parse_document(xml)
}

/// Parse a feed document. Entries keep document order.
pub fn parse_document(xml: &str) -> Result<NormalizedFeed> {
    // Whitespace is kept for mixed content; field values are trimmed when taken.
    let mut reader = Reader::from_str(xml);

    let mut p = DocParser::default();
    loop {
        match reader.read_event().context("parsing feed xml")? {
            Event::Start(e) => p.open(&e, false)?,
            Event::Empty(e) => p.open(&e, true)?,
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                p.close(&name);
            }
            Event::Text(t) => p.push_text(&decode_text(&t)),
            Event::CData(c) => p.push_text(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }
    p.finish()
}

impl DocParser {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<()> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        let Some(kind) = self.kind else {
            self.kind = Some(match name.as_str() {
                "rss" | "RDF" => DocKind::Rss,
                "feed" => DocKind::Atom,
                other => bail!("unsupported feed root element <{other}>"),
            });
            if !empty {
                self.stack.push(Frame { name, media: false });
            }
            return Ok(());
        };

        if self.xhtml.is_some() {
            self.open_xhtml(e, &name, empty);
            return Ok(());
        }

        let xhtml = kind == DocKind::Atom
            && self.current.is_some()
            && matches!(name.as_str(), "content" | "summary")
            && attr(e, "type").as_deref() == Some("xhtml");

        let mut media = false;
        match (kind, name.as_str()) {
            (DocKind::Rss, "item") | (DocKind::Atom, "entry") => {
                self.current = Some(Entry::default());
            }
            (_, "content") if self.current.is_some() => {
                if let Some(url) = attr(e, "url") {
                    media = true;
                    if let Some(entry) = self.current.as_mut() {
                        entry.media.push(MediaRef {
                            url,
                            kind: attr(e, "medium"),
                        });
                    }
                }
            }
            (DocKind::Atom, "link") => {
                let rel_ok = attr(e, "rel").map_or(true, |r| r == "alternate");
                if let (true, Some(href)) = (rel_ok, attr(e, "href")) {
                    let parent = self.parent().map(str::to_string);
                    match (self.current.as_mut(), parent.as_deref()) {
                        (Some(entry), Some("entry")) => {
                            entry.link.get_or_insert(href);
                        }
                        (None, Some("feed")) => {
                            self.channel.link.get_or_insert(href);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        self.text.clear();
        if !empty {
            self.stack.push(Frame { name, media });
            if xhtml {
                self.xhtml = Some(self.stack.len());
            }
        }
        Ok(())
    }

    fn push_text(&mut self, t: &str) {
        if self.xhtml.is_some() {
            self.text.push_str(&html_escape::encode_text(t));
        } else {
            self.text.push_str(t);
        }
    }

    /// Element nested in an xhtml container: echo it as markup. The single
    /// `<div>` directly under the container is the Atom wrapper and is skipped.
    fn open_xhtml(&mut self, e: &BytesStart<'_>, name: &str, empty: bool) {
        let wrapper = Some(self.stack.len()) == self.xhtml && name == "div";
        if !wrapper {
            self.text.push('<');
            self.text.push_str(name);
            for a in e.attributes().flatten() {
                let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                if key == "xmlns" || key.starts_with("xmlns:") {
                    continue;
                }
                let _ = write!(
                    self.text,
                    " {}=\"{}\"",
                    key,
                    html_escape::encode_double_quoted_attribute(&decode_text(&a.value))
                );
            }
            self.text.push_str(if empty { "/>" } else { ">" });
        }
        if !empty {
            self.stack.push(Frame {
                name: name.to_string(),
                media: false,
            });
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(root) = self.xhtml {
            if self.stack.len() > root {
                self.stack.pop();
                if !(self.stack.len() == root && name == "div") {
                    let _ = write!(self.text, "</{name}>");
                }
                return;
            }
            self.xhtml = None;
        }

        let frame = self.stack.pop();
        let value = take_value(&mut self.text);

        if matches!(name, "item" | "entry") {
            if let Some(entry) = self.current.take() {
                self.entries.push(entry);
            }
            return;
        }
        if frame.is_some_and(|f| f.media) {
            return;
        }
        let Some(value) = value else {
            return;
        };

        let parent = self.parent().map(str::to_string);
        let grandparent = self
            .stack
            .len()
            .checked_sub(2)
            .map(|i| self.stack[i].name.clone());

        if name == "url"
            && parent.as_deref() == Some("image")
            && grandparent.as_deref() == Some("channel")
        {
            self.channel.image_url.get_or_insert(value);
            return;
        }

        if let Some(entry) = self.current.as_mut() {
            match (parent.as_deref(), name) {
                (Some("item" | "entry"), field) => assign_entry_field(entry, field, value),
                (Some("author"), "name") if grandparent.as_deref() == Some("entry") => {
                    entry.author.get_or_insert(value);
                }
                _ => {}
            }
            return;
        }

        if matches!(parent.as_deref(), Some("channel" | "feed")) {
            let ch = &mut self.channel;
            match name {
                "title" => {
                    ch.title.get_or_insert(value);
                }
                "description" | "subtitle" => {
                    ch.description.get_or_insert(value);
                }
                "link" => {
                    ch.link.get_or_insert(value);
                }
                "lastBuildDate" | "pubDate" | "updated" => {
                    ch.last_build.get_or_insert(to_rfc2822(value));
                }
                "logo" => {
                    ch.image_url.get_or_insert(value);
                }
                _ => {}
            }
        }
    }

    fn parent(&self) -> Option<&str> {
        self.stack.last().map(|f| f.name.as_str())
    }

    fn finish(self) -> Result<NormalizedFeed> {
        if self.kind.is_none() {
            bail!("empty feed document");
        }
        if !self.stack.is_empty() {
            bail!("truncated feed document (unclosed <{}>)", self.stack[0].name);
        }
        Ok(NormalizedFeed {
            channel: self.channel,
            entries: self.entries,
        })
    }
}

fn assign_entry_field(entry: &mut Entry, field: &str, value: String) {
    let slot = match field {
        "guid" | "id" => &mut entry.id,
        "title" => &mut entry.title,
        "link" => &mut entry.link,
        "description" | "content" => &mut entry.description,
        "summary" => &mut entry.summary,
        "creator" | "author" => &mut entry.author,
        "pubDate" | "published" | "date" | "issued" => {
            entry.published.get_or_insert(to_rfc2822(value));
            return;
        }
        "updated" | "modified" => {
            entry.updated.get_or_insert(to_rfc2822(value));
            return;
        }
        _ => return,
    };
    slot.get_or_insert(value);
}

/// RFC 3339 timestamps (Atom, `dc:date`) are re-expressed as RFC 2822 so that
/// stored items share one date grammar. Anything else is kept verbatim.
fn to_rfc2822(raw: String) -> String {
    OffsetDateTime::parse(&raw, &Rfc3339)
        .ok()
        .and_then(|dt| dt.format(&Rfc2822).ok())
        .unwrap_or(raw)
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| decode_text(&a.value))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn decode_text(raw: &[u8]) -> String {
    html_escape::decode_html_entities(&String::from_utf8_lossy(raw)).into_owned()
}

fn take_value(buf: &mut String) -> Option<String> {
    let v = std::mem::take(buf);
    let t = v.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Harbour News</title>
    <link>https://example.test/harbour</link>
    <description>Posts&nbsp;from the harbour</description>
    <image><title>logo title</title><url>https://example.test/logo.png</url></image>
    <item>
      <title>First &amp; foremost</title>
      <link>https://example.test/p/1</link>
      <description><![CDATA[<p>Hello <b>world</b></p>]]></description>
      <dc:creator>Harbour Desk</dc:creator>
      <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
      <media:content url="https://example.test/1.jpg" medium="image"/>
      <guid isPermaLink="false">post-1</guid>
    </item>
    <item>
      <link>https://example.test/p/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn rss_items_and_channel_are_extracted() {
        let feed = parse_document(RSS).unwrap();
        assert_eq!(feed.channel.title.as_deref(), Some("Harbour News"));
        assert_eq!(
            feed.channel.image_url.as_deref(),
            Some("https://example.test/logo.png")
        );
        assert_eq!(
            feed.channel.description.as_deref(),
            Some("Posts\u{a0}from the harbour")
        );
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.id.as_deref(), Some("post-1"));
        assert_eq!(first.title.as_deref(), Some("First & foremost"));
        assert_eq!(
            first.description.as_deref(),
            Some("<p>Hello <b>world</b></p>")
        );
        assert_eq!(first.author.as_deref(), Some("Harbour Desk"));
        assert_eq!(
            first.media,
            vec![MediaRef {
                url: "https://example.test/1.jpg".into(),
                kind: Some("image".into())
            }]
        );

        let second = &feed.entries[1];
        assert_eq!(second.id, None);
        assert_eq!(second.link.as_deref(), Some("https://example.test/p/2"));
    }

    #[test]
    fn atom_entries_map_onto_the_same_model() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Source</title>
  <subtitle>sub</subtitle>
  <link rel="self" href="https://example.test/atom.xml"/>
  <link href="https://example.test/"/>
  <entry>
    <id>urn:x:1</id>
    <title>A</title>
    <link rel="alternate" href="https://example.test/a"/>
    <summary>short</summary>
    <author><name>Ann</name></author>
    <published>2024-01-03T08:30:00Z</published>
  </entry>
</feed>"#;
        let feed = parse_document(atom).unwrap();
        assert_eq!(feed.channel.link.as_deref(), Some("https://example.test/"));
        assert_eq!(feed.channel.description.as_deref(), Some("sub"));
        let e = &feed.entries[0];
        assert_eq!(e.id.as_deref(), Some("urn:x:1"));
        assert_eq!(e.link.as_deref(), Some("https://example.test/a"));
        assert_eq!(e.summary.as_deref(), Some("short"));
        assert_eq!(e.author.as_deref(), Some("Ann"));
        assert_eq!(
            e.published.as_deref(),
            Some("Wed, 03 Jan 2024 08:30:00 +0000")
        );
    }

    #[test]
    fn atom_xhtml_body_keeps_its_markup() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>urn:x:2</id>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">Read <a href="https://example.test/?a=1&amp;b=2">this</a> &amp; <br/>that</div></content>
  </entry>
</feed>"#;
        let feed = parse_document(atom).unwrap();
        assert_eq!(
            feed.entries[0].description.as_deref(),
            Some(r#"Read <a href="https://example.test/?a=1&amp;b=2">this</a> &amp; <br/>that"#)
        );
    }

    #[test]
    fn malformed_or_foreign_documents_fail() {
        assert!(parse_document("<rss><channel><item></channel></rss>").is_err());
        assert!(parse_document("<html><body/></html>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_bytes(&[0xff, 0xfe, 0x00]).is_err());
    }
}
