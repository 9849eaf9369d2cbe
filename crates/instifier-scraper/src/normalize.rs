//! Pure conversions shared by both acquisition strategies: abbreviated
//! counts, timestamps, and the bio location heuristic.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?\s*(?:([kmb])\b)?").expect("valid count regex")
});

/// Unix timestamps above this magnitude are treated as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Fraction digits beyond this are ignored when scaling a mantissa.
const MAX_FRACTION_DIGITS: usize = 9;

/// Emoji that conventionally prefix a location line in a bio.
const LOCATION_MARKERS: [&str; 5] = ["📍", "🏠", "🌍", "✈", "🏢"];

/// Parses display counts such as `"1.2k"`, `"2,500"`, `"3M followers"` or
/// `"10-20"` into an integer.
///
/// Ranges separated by a hyphen, en dash or em dash yield the integer average
/// of both ends. Anything without a leading number yields `0`.
#[must_use]
pub fn parse_abbreviated_count(text: &str) -> u64 {
    let cleaned = strip_separators(&text.to_lowercase());

    let parts: Vec<&str> = cleaned.split(['-', '–', '—']).collect();
    if parts.len() == 2 {
        if let (Some(low), Some(high)) = (parse_single(parts[0]), parse_single(parts[1])) {
            let avg = (u128::from(low) + u128::from(high)) / 2;
            return u64::try_from(avg).unwrap_or(u64::MAX);
        }
    }

    parse_single(&cleaned).unwrap_or(0)
}

/// Drops thousands separators and whitespace that sits between digits.
fn strip_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            continue;
        }
        if c.is_whitespace() {
            let prev_digit = out.chars().last().is_some_and(|p| p.is_ascii_digit());
            let next_digit = chars[i + 1..]
                .iter()
                .find(|n| !n.is_whitespace())
                .is_some_and(char::is_ascii_digit);
            if prev_digit && next_digit {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn parse_single(text: &str) -> Option<u64> {
    let caps = COUNT_RE.captures(text)?;
    let whole: u128 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier: u128 = match caps.get(3).map(|m| m.as_str()) {
        Some("k") => 1_000,
        Some("m") => 1_000_000,
        Some("b") => 1_000_000_000,
        _ => 1,
    };

    let mut value = whole.saturating_mul(multiplier);
    if let Some(fraction) = caps.get(2) {
        let digits = &fraction.as_str()[..fraction.as_str().len().min(MAX_FRACTION_DIGITS)];
        let scale = 10u128.pow(u32::try_from(digits.len()).unwrap_or(0));
        let numerator: u128 = digits.parse().unwrap_or(0);
        value = value.saturating_add(numerator * multiplier / scale);
    }

    Some(u64::try_from(value).unwrap_or(u64::MAX))
}

/// A timestamp as either strategy encounters it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTimestamp {
    Unix(i64),
    Text(String),
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        Self::Unix(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RawTimestamp {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Parses a Unix timestamp (seconds or milliseconds) or an ISO-like string.
///
/// Naive date-times are taken as UTC; a bare date is midnight UTC.
#[must_use]
pub fn parse_timestamp(raw: impl Into<RawTimestamp>) -> Option<DateTime<Utc>> {
    match raw.into() {
        RawTimestamp::Unix(value) => from_unix(value),
        RawTimestamp::Text(text) => parse_text_timestamp(text.trim()),
    }
}

fn from_unix(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<i64>() {
        return from_unix(value);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical RFC 3339 UTC form (`2024-01-02T03:04:05Z`), or `""` when the
/// input cannot be read.
#[must_use]
pub fn to_iso8601(raw: impl Into<RawTimestamp>) -> String {
    parse_timestamp(raw)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

/// `"March 2021"` style label used for approximate join dates.
#[must_use]
pub fn month_year(dt: DateTime<Utc>) -> String {
    dt.format("%B %Y").to_string()
}

/// Text after the first location emoji in `bio`, up to the end of that line.
#[must_use]
pub fn location_from_bio(bio: &str) -> String {
    for marker in LOCATION_MARKERS {
        let Some(idx) = bio.find(marker) else {
            continue;
        };
        let rest = bio[idx + marker.len()..].trim_start_matches('\u{fe0f}');
        let line = rest.split('\n').next().unwrap_or_default().trim();
        if !line.is_empty() {
            return line.to_owned();
        }
    }
    String::new()
}

/// Joins the non-blank address parts with `", "`.
#[must_use]
pub fn join_address<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
