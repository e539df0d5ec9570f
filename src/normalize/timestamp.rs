//! Multi-format timestamp parsing. English month names regardless of
//! locale; naive timestamps are taken as UTC, offsets converted to UTC.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%d/%b/%Y:%H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%b/%Y:%H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Syslog stamps carry no year; one is prepended before parsing.
const SYSLOG_FORMAT: &str = "%Y %b %d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampParser {
    assumed_year: i32,
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TimestampParser {
    /// `assumed_year` fills in year-less syslog stamps; defaults to the
    /// current UTC year.
    pub fn new(assumed_year: Option<i32>) -> Self {
        Self {
            assumed_year: assumed_year.unwrap_or_else(|| Utc::now().year()),
        }
    }

    pub fn assumed_year(&self) -> i32 {
        self.assumed_year
    }

    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let s = canonical_text(raw)?;

        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        if s.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let with_year = format!("{} {}", self.assumed_year, s);
            if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, SYSLOG_FORMAT) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        None
    }
}

/// Collapse whitespace, turn a `,` fraction separator into `.`, and spell a
/// trailing `Z` as `+00:00`.
fn canonical_text(raw: &str) -> Option<String> {
    let mut s = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.is_empty() {
        return None;
    }
    let bytes = s.as_bytes();
    if let Some(pos) = (1..bytes.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b','
            && bytes[i - 1].is_ascii_digit()
            && bytes[i + 1].is_ascii_digit()
            && i >= 3
            && bytes[i - 3] == b':'
    }) {
        s.replace_range(pos..pos + 1, ".");
    }
    if s.ends_with('Z') || s.ends_with('z') {
        s.pop();
        s.push_str("+00:00");
    }
    Some(s)
}
