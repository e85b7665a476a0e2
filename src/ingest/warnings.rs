/// Official weather warnings feed client.
///
/// The feed is RSS 2.0. Items published through the national CAP gateway
/// may carry CAP fields alongside the usual RSS ones:
///
///   <item>
///     <title>Red alert: extremely heavy rainfall</title>
///     <description>...</description>
///     <pubDate>Wed, 03 Jul 2024 06:00:00 GMT</pubDate>
///     <severity>Severe</severity>          CAP severity
///     <area>Kamrup Metropolitan</area>     CAP areaDesc
///     <effective>2024-07-03T06:00:00+00:00</effective>
///     <expires>2024-07-04T06:00:00+00:00</expires>
///   </item>
///
/// Items without CAP fields are still usable: severity falls back to the
/// IMD colour code in the title (red / orange / yellow), the area to the
/// item text, and the onset to `pubDate`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::ingest::{PayloadFormat, RawPayload, SourceClient};
use crate::model::{FloodError, Warning, WarningSeverity};

/// Category used when an item has none.
const DEFAULT_CATEGORY: &str = "weather";

// ============================================================================
// Feed structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RssFeed {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    category: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    severity: Option<String>,
    area: Option<String>,
    effective: Option<String>,
    expires: Option<String>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Maps a CAP `severity` value. `Unknown` and unrecognised values give
/// `None` so the caller can look elsewhere.
fn severity_from_cap(value: &str) -> Option<WarningSeverity> {
    match value.trim().to_ascii_lowercase().as_str() {
        "extreme" | "severe" => Some(WarningSeverity::High),
        "moderate" => Some(WarningSeverity::Medium),
        "minor" => Some(WarningSeverity::Low),
        _ => None,
    }
}

/// Maps an IMD colour code appearing as a word in `text`.
fn severity_from_colour(text: &str) -> Option<WarningSeverity> {
    let lower = text.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.contains(&"red") {
        Some(WarningSeverity::High)
    } else if words.contains(&"orange") {
        Some(WarningSeverity::Medium)
    } else if words.contains(&"yellow") || words.contains(&"green") {
        Some(WarningSeverity::Low)
    } else {
        None
    }
}

/// Accepts RFC 3339 (CAP) or RFC 2822 (RSS) timestamps.
fn parse_feed_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// True if one of the comma- or semicolon-separated `<area>` entries is
/// `district`, ignoring case.
fn area_lists(area: &str, district: &str) -> bool {
    area.split([',', ';'])
        .map(str::trim)
        .any(|entry| entry.eq_ignore_ascii_case(district))
}

/// True if `text` names `district` as a whole word. A following
/// capitalised word extends the name ("Kamrup Metropolitan" is not
/// "Kamrup").
fn mentions_district(text: &str, district: &str) -> bool {
    let district = district.trim();
    if district.is_empty() {
        return false;
    }
    text.char_indices().any(|(start, _)| {
        let end = start + district.len();
        let Some(candidate) = text.get(start..end) else {
            return false;
        };
        if !candidate.eq_ignore_ascii_case(district) {
            return false;
        }
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let rest = &text[end..];
        let after_ok = match rest.chars().next() {
            None => true,
            Some(c) if c.is_alphanumeric() => false,
            Some(c) if c.is_whitespace() => !rest
                .trim_start()
                .chars()
                .next()
                .is_some_and(char::is_uppercase),
            Some(_) => true,
        };
        before_ok && after_ok
    })
}

impl RssItem {
    fn applies_to(&self, district: &str) -> bool {
        match non_empty(&self.area) {
            Some(area) => area_lists(area, district),
            None => mentions_district(&format!("{} {}", self.title, self.description), district),
        }
    }

    fn severity(&self) -> WarningSeverity {
        non_empty(&self.severity)
            .and_then(severity_from_cap)
            .or_else(|| severity_from_colour(&self.title))
            .unwrap_or(WarningSeverity::Medium)
    }

    fn into_warning(self, district: &str, provider: &str) -> Warning {
        let severity = self.severity();
        let onset = parse_feed_time(non_empty(&self.effective))
            .or_else(|| parse_feed_time(non_empty(&self.pub_date)));
        let expiry = parse_feed_time(non_empty(&self.expires));
        let description = match (self.title.trim(), self.description.trim()) {
            ("", body) => body.to_string(),
            (title, "") => title.to_string(),
            (title, body) => format!("{}: {}", title, body),
        };
        Warning {
            district: district.to_string(),
            description,
            onset,
            expiry,
            severity,
            category: non_empty(&self.category)
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            source: provider.to_string(),
        }
    }
}

/// Parses the feed and keeps the items that apply to `district`.
///
/// Expired items are kept; activity is judged at scoring time. An empty
/// channel is a valid empty list, while XML that does not parse is a
/// `Format` error.
pub fn parse_warnings(payload: &RawPayload, district: &str) -> Result<Vec<Warning>, FloodError> {
    let feed: RssFeed = quick_xml::de::from_str(&payload.body)
        .map_err(|e| FloodError::Format(format!("{}: malformed warnings feed: {}", payload.provider, e)))?;

    Ok(feed
        .channel
        .items
        .into_iter()
        .filter(|item| item.applies_to(district))
        .map(|item| item.into_warning(district, &payload.provider))
        .collect())
}

pub fn fetch_warnings(
    client: &SourceClient,
    source: &SourceConfig,
    district: &str,
) -> Result<Vec<Warning>, FloodError> {
    let payload = client.fetch(source, &source.base_url, PayloadFormat::Xml)?;
    parse_warnings(&payload, district)
}

// ============================================================================
// Tests
// ============================================================================
