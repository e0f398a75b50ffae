//! Permissive publish-date parsing
//!
//! Feeds publish dates in RFC 2822, ISO 8601 and a long tail of ad-hoc
//! formats, some with Portuguese month abbreviations. Everything that parses
//! is returned in UTC-3; naive timestamps are taken as UTC.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use econnect_core::local_offset;

/// Portuguese month abbreviations and their English equivalents
const PT_MONTHS: [(&str, &str); 12] = [
    ("jan", "Jan"),
    ("fev", "Feb"),
    ("mar", "Mar"),
    ("abr", "Apr"),
    ("mai", "May"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("ago", "Aug"),
    ("set", "Sep"),
    ("out", "Oct"),
    ("nov", "Nov"),
    ("dez", "Dec"),
];

/// Formats carrying an explicit offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%b %d, %Y %H:%M:%S %z",
];

/// Date-time formats without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only formats, taken as midnight UTC
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%b %d, %Y", "%b %d %Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Zone names treated as UTC when trailing a naive timestamp
const UTC_ZONES: &[&str] = &["GMT", "UTC", "UT", "Z"];

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").ok());

static LEADING_WEEKDAY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3,9},?\s+").ok());

/// Parse a raw feed date into UTC-3
///
/// Returns `None` for empty or unparsable input; failures are logged.
pub fn normalize_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!("Empty date string");
        return None;
    }

    let translated = translate_months(trimmed);
    match parse_permissive(&translated) {
        Some(parsed) => Some(parsed.with_timezone(&local_offset())),
        None => {
            warn!("Failed to parse date: {}", raw);
            None
        }
    }
}

/// Replace Portuguese month abbreviations that stand between whitespace
pub fn translate_months(s: &str) -> Cow<'_, str> {
    let Some(word) = WORD.as_ref() else {
        return Cow::Borrowed(s);
    };

    word.replace_all(s, |caps: &Captures| {
        let Some(m) = caps.get(0) else {
            return String::new();
        };
        let padded = is_space_before(s, m.start()) && is_space_after(s, m.end());
        match month_in_english(m.as_str()) {
            Some(english) if padded => english.to_string(),
            _ => m.as_str().to_string(),
        }
    })
}

fn is_space_before(s: &str, idx: usize) -> bool {
    s[..idx].chars().next_back().is_some_and(char::is_whitespace)
}

fn is_space_after(s: &str, idx: usize) -> bool {
    s[idx..].chars().next().is_some_and(char::is_whitespace)
}

fn month_in_english(token: &str) -> Option<&'static str> {
    if token.len() != 3 {
        return None;
    }
    let lower = token.to_ascii_lowercase();
    PT_MONTHS
        .iter()
        .find(|(pt, _)| *pt == lower)
        .map(|(_, en)| *en)
}

fn parse_permissive(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Some(parsed) = parse_candidate(s) {
        return Some(parsed);
    }

    // Feeds sometimes carry a weekday that disagrees with the date
    let without_weekday = LEADING_WEEKDAY.as_ref()?.replace(s, "");
    if without_weekday != s {
        return parse_candidate(&without_weekday);
    }
    None
}

fn parse_candidate(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(s) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(s, fmt) {
            return Some(parsed);
        }
    }

    let naive = strip_zone_name(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(parsed.and_utc().fixed_offset());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(naive, fmt) {
            return Some(parsed.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset());
        }
    }
    None
}

/// Drop a trailing UTC zone name (`GMT`, `UTC`, `Z`)
fn strip_zone_name(s: &str) -> &str {
    for zone in UTC_ZONES {
        if let Some(rest) = s.strip_suffix(zone) {
            if rest.ends_with(|c: char| c.is_whitespace() || c.is_ascii_digit()) {
                return rest.trim_end();
            }
        }
    }
    s
}
