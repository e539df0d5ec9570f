//! Ordered format rules. Each rule is a regex whose named captures are
//! resolved through the field alias table, plus a refinement step for what
//! the captures alone cannot express.

use super::heuristics;
use super::{Level, LogFormat, ParsedLogEntry, TimestampParser};
use crate::schema::Field;
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub(super) struct FormatRule {
    pub format: LogFormat,
    matcher: Regex,
    refine: fn(&mut ParsedLogEntry, &TimestampParser),
}

impl FormatRule {
    fn new(format: LogFormat, pattern: &str, refine: fn(&mut ParsedLogEntry, &TimestampParser)) -> Self {
        Self {
            format,
            matcher: Regex::new(pattern).expect("format rule pattern"),
            refine,
        }
    }

    /// Apply the rule to `entry` if it matches the raw line.
    pub fn apply(&self, entry: &mut ParsedLogEntry, timestamps: &TimestampParser) -> bool {
        let caps = match self.matcher.captures(&entry.message_raw) {
            Some(c) => c,
            None => return false,
        };
        let captured = captured_fields(&self.matcher, &caps);
        for (field, value) in captured {
            assign(entry, field, &value, timestamps);
        }
        entry.format = self.format;
        (self.refine)(entry, timestamps);
        true
    }
}

fn captured_fields(matcher: &Regex, caps: &Captures<'_>) -> Vec<(Field, String)> {
    matcher
        .capture_names()
        .flatten()
        .filter_map(|name| {
            let value = caps.name(name)?.as_str().trim();
            if value.is_empty() {
                return None;
            }
            Some((Field::resolve(name)?, value.to_string()))
        })
        .collect()
}

fn assign(entry: &mut ParsedLogEntry, field: Field, value: &str, timestamps: &TimestampParser) {
    match field {
        Field::Timestamp => {
            entry.timestamp = timestamps.parse(value);
            entry.timestamp_raw = Some(value.to_string());
        }
        Field::Level => {
            entry.level = Level::canonicalize(value);
            entry.level_raw = Some(value.to_string());
        }
        Field::Host => entry.host = Some(value.to_string()),
        Field::IpSrc => entry.ip_src = Some(value.to_string()),
        Field::IpDst => entry.ip_dst = Some(value.to_string()),
        Field::Service => entry.service = Some(value.to_string()),
        Field::Pid => entry.pid = value.parse().ok(),
        Field::EventId => entry.event_id = value.parse().ok(),
        Field::HttpStatus => entry.http_status = value.parse().ok(),
        Field::PeerPort => entry.peer_port = value.parse().ok(),
        Field::Message => entry.message = value.to_string(),
        // Provenance comes from the line source, never from the text.
        Field::SourceId | Field::LineNumber => {}
    }
}

/// Level from the HTTP status class.
fn access_log(entry: &mut ParsedLogEntry, _: &TimestampParser) {
    entry.level = match entry.http_status {
        Some(500..=599) => Level::Error,
        Some(400..=499) => Level::Warning,
        _ => Level::Info,
    };
}

/// Addresses in the captured message fill whichever of src/dst is empty.
fn fill_addresses(entry: &mut ParsedLogEntry, _: &TimestampParser) {
    let found: Vec<String> = heuristics::ipv4_addresses(&entry.message)
        .take(2)
        .map(str::to_string)
        .collect();
    let mut found = found.into_iter();
    if let Some(first) = found.next() {
        if entry.ip_src.is_none() {
            entry.ip_src = Some(first);
        }
    }
    if let Some(second) = found.next() {
        if entry.ip_dst.is_none() {
            entry.ip_dst = Some(second);
        }
    }
}

/// Catch-all: mine the raw line for a timestamp, severity and addresses.
fn unstructured(entry: &mut ParsedLogEntry, timestamps: &TimestampParser) {
    let raw = entry.message_raw.clone();
    if let Some(ts) = heuristics::embedded_timestamp(&raw) {
        entry.timestamp = timestamps.parse(ts);
        entry.timestamp_raw = Some(ts.to_string());
    }
    if let Some(tokens) = heuristics::severity_tokens(&raw) {
        entry.level = Level::canonicalize(&tokens);
        entry.level_raw = Some(tokens);
    }
    let mut ips = heuristics::ipv4_addresses(&raw);
    entry.ip_src = ips.next().map(str::to_string);
    entry.ip_dst = ips.next().map(str::to_string);
}

const ACCESS_LOG: &str = r#"^(?P<ip>\d{1,3}(?:\.\d{1,3}){3}) \S+ \S+ \[(?P<timestamp>[^\]]+)\] "(?P<method>\w+) (?P<path>[^"]*)" (?P<status>\d{3}) (?P<size>\d+|-)(?: "(?P<referer>[^"]*)" "(?P<user_agent>[^"]*)")?"#;
const SYSLOG: &str = r"^(?:<\d{1,3}>)?(?P<timestamp>[A-Za-z]{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(?P<host>\S+)\s+(?P<process>[^\s\[:]+)(?:\[(?P<pid>\d+)\])?:\s*(?P<message>.*)$";
const WINDOWS_EVENT: &str = r"^TimeGenerated:\s*(?P<timestamp>[^,]+),\s*EventID:\s*(?P<event_id>\d+),\s*Level:\s*(?P<level>\w+),\s*Source:\s*(?P<source>[^,]+),\s*Message:\s*(?P<message>.*)$";
const ISO8601: &str = r"^(?P<timestamp>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\s*(?:\[(?P<level>\w+)\]|(?P<severity>(?i:critical|fatal|error|warning|warn|info|debug|trace))\b)?[\s:]*(?P<message>.*)$";
const CATCH_ALL: &str = r"(?s)^(?P<message>.*)$";

/// Rules in priority order; the last one always matches.
pub(super) fn rules() -> &'static [FormatRule] {
    static RULES: OnceLock<Vec<FormatRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            FormatRule::new(LogFormat::AccessLog, ACCESS_LOG, access_log),
            FormatRule::new(LogFormat::Syslog, SYSLOG, fill_addresses),
            FormatRule::new(LogFormat::WindowsEvent, WINDOWS_EVENT, fill_addresses),
            FormatRule::new(LogFormat::Iso8601, ISO8601, fill_addresses),
            FormatRule::new(LogFormat::Unstructured, CATCH_ALL, unstructured),
        ]
    })
}
