//! URL-friendly file names from feed titles.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Lowercase, hyphenate whitespace runs, drop punctuation (Unicode letters such as CJK
/// are kept), collapse hyphen runs and trim hyphens from both ends.
pub fn slugify(title: &str) -> String {
    static RE_SPACE: OnceCell<Regex> = OnceCell::new();
    static RE_STRIP: OnceCell<Regex> = OnceCell::new();
    static RE_DASHES: OnceCell<Regex> = OnceCell::new();
    let re_space = RE_SPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
    let re_strip = RE_STRIP.get_or_init(|| Regex::new(r"[^\w-]").unwrap());
    let re_dashes = RE_DASHES.get_or_init(|| Regex::new(r"-+").unwrap());

    let lower = title.to_lowercase();
    let out = re_space.replace_all(&lower, "-");
    let out = re_strip.replace_all(&out, "");
    let out = re_dashes.replace_all(&out, "-");
    out.trim_matches('-').to_string()
}

/// Slug for a source, falling back to a short hash of its URL when the title
/// has nothing slug-worthy in it.
pub fn slug_for_source(title: &str, source_url: &str) -> String {
    let s = slugify(title);
    if s.is_empty() {
        format!("feed-{}", short_hash(source_url))
    } else {
        s
    }
}

/// `base` suffixed with a short hash of the source URL, for when two
/// sources would otherwise share one file.
pub fn disambiguate(base: &str, source_url: &str) -> String {
    format!("{base}-{}", short_hash(source_url))
}

fn short_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(8);
    for b in digest.iter().take(4) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_titles() {
        assert_eq!(slugify("Harbour News"), "harbour-news");
        assert_eq!(slugify("  Rock & Roll -- Daily!  "), "rock-roll-daily");
    }

    #[test]
    fn control_whitespace_never_reaches_file_names() {
        assert_eq!(slugify("Line\tone\nLine\r\ntwo"), "line-one-line-two");
        assert_eq!(slugify("\u{3000}全角\u{3000}空白"), "全角-空白");
    }

    #[test]
    fn cjk_is_kept() {
        assert_eq!(slugify("香港 新聞"), "香港-新聞");
    }

    #[test]
    fn disambiguated_slugs_differ_per_source() {
        let a = disambiguate("news", "https://a.test/rss");
        assert!(a.starts_with("news-"));
        assert_ne!(a, disambiguate("news", "https://b.test/rss"));
    }

    #[test]
    fn empty_slug_falls_back_to_url_hash() {
        let a = slug_for_source("!!!", "https://a.test/rss");
        let b = slug_for_source("!!!", "https://b.test/rss");
        assert!(a.starts_with("feed-"));
        assert_eq!(a.len(), "feed-".len() + 8);
        assert_ne!(a, b);
        assert_eq!(a, slug_for_source("", "https://a.test/rss"));
    }
}
