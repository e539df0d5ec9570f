//! Canonicalization and validation of normalized entries: trimmed strings,
//! UTC timestamps, the level vocabulary, IPv4 validity, de-duplication,
//! time ordering and calendar fields. Cleaning cleaned output is a no-op.

use crate::normalize::{peer_port, Level, NormalizerConfig, ParsedLogEntry, TimestampParser};
use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::debug;

/// Values treated as missing after trimming.
const NULLISH: &[&str] = &["", "nan", "NaN", "None", "none", "null", "NULL"];

/// An entry excluded by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub line_number: Option<u64>,
    pub source_id: String,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub input: usize,
    pub kept: usize,
    pub duplicates_removed: usize,
    pub invalid_ips: usize,
    pub validation_failures: Vec<ValidationFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    pub entries: Vec<ParsedLogEntry>,
    pub report: CleanReport,
}

#[derive(Hash, PartialEq, Eq)]
enum DedupKey {
    Located(Option<DateTime<Utc>>, String, u64),
    Fingerprint([u8; 32]),
}

pub struct Cleaner {
    timestamps: TimestampParser,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Cleaner {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            timestamps: TimestampParser::new(config.assumed_year),
        }
    }

    pub fn clean(&self, entries: Vec<ParsedLogEntry>) -> CleanOutcome {
        let mut report = CleanReport {
            input: entries.len(),
            ..Default::default()
        };

        let mut valid = Vec::with_capacity(entries.len());
        for mut entry in entries {
            self.canonicalize(&mut entry, &mut report);
            match validation_error(&entry) {
                Some(reason) => report.validation_failures.push(ValidationFailure {
                    line_number: entry.line_number,
                    source_id: entry.source_id.clone(),
                    raw: entry.message_raw.clone(),
                    reason: reason.to_string(),
                }),
                None => valid.push(entry),
            }
        }

        let valid_len = valid.len();
        let mut seen = HashSet::with_capacity(valid_len);
        let mut kept: Vec<ParsedLogEntry> = valid.into_iter().filter(|e| seen.insert(dedup_key(e))).collect();
        report.duplicates_removed = valid_len - kept.len();

        // Stable: ties keep input order; untimed entries go last.
        kept.sort_by_key(|e| (e.timestamp.is_none(), e.timestamp));
        for entry in &mut kept {
            set_calendar(entry);
        }

        report.kept = kept.len();
        debug!(
            input = report.input,
            kept = report.kept,
            duplicates = report.duplicates_removed,
            invalid = report.validation_failures.len(),
            "cleaned entries"
        );
        CleanOutcome { entries: kept, report }
    }

    fn canonicalize(&self, entry: &mut ParsedLogEntry, report: &mut CleanReport) {
        entry.source_id = entry.source_id.trim().to_string();
        entry.message = entry.message.trim().to_string();
        for field in [
            &mut entry.timestamp_raw,
            &mut entry.host,
            &mut entry.level_raw,
            &mut entry.ip_src,
            &mut entry.ip_dst,
            &mut entry.service,
        ] {
            null_if_blank(field);
        }

        if entry.timestamp.is_none() {
            if let Some(raw) = &entry.timestamp_raw {
                entry.timestamp = self.timestamps.parse(raw);
            }
        }
        entry.timestamp_iso = entry
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true));

        if let Some(raw) = &entry.level_raw {
            entry.level = Level::canonicalize(raw);
        }

        entry.ip_src_valid = validate_ip(&mut entry.ip_src, report);
        entry.ip_dst_valid = validate_ip(&mut entry.ip_dst, report);

        if entry.peer_port.is_none() {
            entry.peer_port = peer_port(&entry.message);
        }
    }
}

fn null_if_blank(field: &mut Option<String>) {
    let cleaned = match field.as_deref().map(str::trim) {
        Some(v) if NULLISH.contains(&v) => None,
        Some(v) => Some(v.to_string()),
        None => return,
    };
    *field = cleaned;
}

fn validate_ip(field: &mut Option<String>, report: &mut CleanReport) -> bool {
    match field.as_deref().map(|v| v.parse::<Ipv4Addr>()) {
        Some(Ok(_)) => true,
        Some(Err(_)) => {
            report.invalid_ips += 1;
            *field = None;
            false
        }
        None => false,
    }
}

fn validation_error(entry: &ParsedLogEntry) -> Option<&'static str> {
    if entry.source_id.is_empty() {
        Some("empty source id")
    } else if entry.message.is_empty() && entry.message_raw.trim().is_empty() {
        Some("empty message")
    } else {
        None
    }
}

fn dedup_key(entry: &ParsedLogEntry) -> DedupKey {
    match entry.line_number {
        Some(line) => DedupKey::Located(entry.timestamp, entry.source_id.clone(), line),
        None => {
            let bytes = serde_json::to_vec(entry).unwrap_or_else(|_| format!("{:?}", entry).into_bytes());
            DedupKey::Fingerprint(Sha256::digest(&bytes).into())
        }
    }
}

fn set_calendar(entry: &mut ParsedLogEntry) {
    match entry.timestamp {
        Some(ts) => {
            let day = ts.weekday();
            entry.day_of_week = Some(day);
            entry.hour_of_day = Some(ts.hour());
            entry.is_weekend = Some(matches!(day, Weekday::Sat | Weekday::Sun));
        }
        None => {
            entry.day_of_week = None;
            entry.hour_of_day = None;
            entry.is_weekend = None;
        }
    }
}

/// Clean with default settings.
pub fn clean(entries: Vec<ParsedLogEntry>) -> CleanOutcome {
    Cleaner::default().clean(entries)
}
