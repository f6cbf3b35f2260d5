//! # Dashboard
//! Static HTML status page rendered from the run ledger.
//!
//! Templates are plain HTML with four placeholders:
//! `{{ total_feeds }}`, `{{ total_items }}`, `{{ last_run }}`, `{{ feed_rows }}`.
//! Every interpolated value is HTML-escaped here; templates stay dumb.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;
use std::path::Path;

use crate::ledger::{RunLedger, RunRecord, RunStatus};
use crate::persist;

pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Feed Accumulator Dashboard</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <div class="container">
        <header>
            <h1>Feed Accumulator Dashboard</h1>
        </header>
        <div class="stats">
            <div class="stat-card"><div class="stat-value">{{ total_feeds }}</div><div class="stat-label">Active Feeds</div></div>
            <div class="stat-card"><div class="stat-value">{{ total_items }}</div><div class="stat-label">Total Items</div></div>
            <div class="stat-card"><div class="stat-value">{{ last_run }}</div><div class="stat-label">Last Update</div></div>
        </div>
        <div class="table-container">
            <table class="feed-table">
                <thead>
                    <tr>
                        <th>Feed</th><th>Source</th><th>Accumulated Feed</th>
                        <th>Last Updated</th><th>Items</th><th>New</th><th>Status</th>
                    </tr>
                </thead>
                <tbody>
{{ feed_rows }}
                </tbody>
            </table>
        </div>
    </div>
    <script>
        function copyToClipboard(text) {
            navigator.clipboard.writeText(text).catch(err => console.error('Failed to copy:', err));
        }
    </script>
</body>
</html>
"#;

/// How timestamps are shown on the page.
#[derive(Debug, Clone)]
pub struct DisplayZone {
    pub offset: FixedOffset,
    pub label: String,
}

/// `MM/DD/YYYY HH:MM AM <label>`, or `Never`.
pub fn format_local(ts: Option<DateTime<Utc>>, zone: &DisplayZone) -> String {
    match ts {
        Some(t) => format!(
            "{} {}",
            t.with_timezone(&zone.offset).format("%m/%d/%Y %I:%M %p"),
            zone.label
        ),
        None => "Never".to_string(),
    }
}

/// Coarse "N units ago" relative to `now`.
pub fn relative_time(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(t) = ts else {
        return "Never".to_string();
    };
    let secs = (now - t).num_seconds().max(0);
    if secs < 60 {
        format!("{secs} sec ago")
    } else if secs < 3_600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86_400 {
        format!("{} hr ago", secs / 3_600)
    } else {
        format!("{} days ago", secs / 86_400)
    }
}

fn status_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "✅",
        RunStatus::Failure => "❌",
    }
}

fn render_row(out: &mut String, r: &RunRecord, zone: &DisplayZone, now: DateTime<Utc>) {
    let _ = write!(
        out,
        r#"                    <tr>
                        <td class="feed-title" title="{desc}">{title}</td>
                        <td><a href="{source}" target="_blank" class="btn-link">Source →</a></td>
                        <td><button class="btn-copy" data-url="{published}" onclick="copyToClipboard(this.dataset.url)">Copy RSS</button></td>
                        <td class="time-cell"><div class="relative-time">{relative}</div><div class="absolute-time">{absolute}</div></td>
                        <td class="items-count">{total}</td>
                        <td class="items-new">{new}</td>
                        <td class="status-cell">{icon}</td>
                    </tr>
"#,
        desc = encode_double_quoted_attribute(&r.description),
        title = encode_text(&r.title),
        source = encode_double_quoted_attribute(&r.source_url),
        published = encode_double_quoted_attribute(&r.published_feed_url),
        relative = encode_text(&relative_time(Some(r.last_updated), now)),
        absolute = encode_text(&format_local(Some(r.last_updated), zone)),
        total = r.total_items,
        new = r.new_items_this_run,
        icon = status_icon(r.status),
    );
}

pub fn render(
    ledger: &RunLedger,
    template: &str,
    zone: &DisplayZone,
    now: DateTime<Utc>,
) -> String {
    let mut rows = String::new();
    for r in ledger.records() {
        render_row(&mut rows, r, zone, now);
    }
    template
        .replace("{{ total_feeds }}", &ledger.len().to_string())
        .replace("{{ total_items }}", &ledger.total_items().to_string())
        .replace(
            "{{ last_run }}",
            &encode_text(&format_local(ledger.last_run(), zone)),
        )
        .replace("{{ feed_rows }}", rows.trim_end_matches('\n'))
}

/// Template from disk when present, built-in page otherwise.
pub async fn load_template(path: &Path) -> Result<String> {
    match persist::read_optional(path).await? {
        Some(bytes) => String::from_utf8(bytes)
            .with_context(|| format!("template {} is not UTF-8", path.display())),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Render and atomically write the dashboard. Returns the number of feeds shown.
pub async fn render_to_file(
    ledger: &RunLedger,
    template_path: &Path,
    out_path: &Path,
    zone: &DisplayZone,
    now: DateTime<Utc>,
) -> Result<usize> {
    let template = load_template(template_path).await?;
    let html = render(ledger, &template, zone, now);
    persist::write_atomic(out_path, html.as_bytes()).await?;
    tracing::info!(
        target: "dashboard",
        path = %out_path.display(),
        feeds = ledger.len(),
        items = ledger.total_items(),
        "dashboard written"
    );
    Ok(ledger.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hkt() -> DisplayZone {
        DisplayZone {
            offset: FixedOffset::east_opt(8 * 3600).unwrap(),
            label: "HKT".into(),
        }
    }

    #[test]
    fn local_format_uses_offset_and_label() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 13, 5, 0).unwrap();
        assert_eq!(format_local(Some(t), &hkt()), "05/01/2024 09:05 PM HKT");
        assert_eq!(format_local(None, &hkt()), "Never");
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        assert_eq!(relative_time(Some(now - Duration::seconds(42)), now), "42 sec ago");
        assert_eq!(relative_time(Some(now - Duration::minutes(5)), now), "5 min ago");
        assert_eq!(relative_time(Some(now - Duration::hours(3)), now), "3 hr ago");
        assert_eq!(relative_time(Some(now - Duration::days(2)), now), "2 days ago");
        assert_eq!(relative_time(None, now), "Never");
    }
}
