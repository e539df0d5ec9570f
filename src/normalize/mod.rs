//! Raw line → [`ParsedLogEntry`]. Total and lossless: every input line
//! yields exactly one entry; lines no structured rule recognizes fall through
//! to the catch-all and keep their text as the message.

mod heuristics;
mod level;
mod rules;
mod timestamp;

pub use heuristics::{indicator_tags, ipv4_addresses, peer_port};
pub use level::Level;
pub use timestamp::TimestampParser;

use crate::cancel::CancelToken;
use crate::collectors::RawLine;
use crate::error::PipelineError;
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Which format rule produced an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    AccessLog,
    Syslog,
    WindowsEvent,
    Iso8601,
    #[default]
    Unstructured,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::AccessLog => "access_log",
            LogFormat::Syslog => "syslog",
            LogFormat::WindowsEvent => "windows_event",
            LogFormat::Iso8601 => "iso8601",
            LogFormat::Unstructured => "unstructured",
        }
    }

    pub fn is_structured(self) -> bool {
        self != LogFormat::Unstructured
    }
}

/// One normalized log record. Optional fields are `None` when the line did
/// not carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub timestamp_raw: Option<String>,
    pub timestamp_iso: Option<String>,
    pub source_id: String,
    pub host: Option<String>,
    pub format: LogFormat,
    pub level: Level,
    pub level_raw: Option<String>,
    pub ip_src: Option<String>,
    pub ip_dst: Option<String>,
    pub ip_src_valid: bool,
    pub ip_dst_valid: bool,
    pub service: Option<String>,
    pub pid: Option<u32>,
    pub event_id: Option<u32>,
    pub http_status: Option<u16>,
    pub message: String,
    /// The full original line, never modified.
    pub message_raw: String,
    pub indicator_tags: BTreeSet<String>,
    pub peer_port: Option<u16>,
    pub line_number: Option<u64>,
    pub day_of_week: Option<Weekday>,
    pub hour_of_day: Option<u32>,
    pub is_weekend: Option<bool>,
}

impl ParsedLogEntry {
    /// Entry carrying only the raw text and its provenance.
    pub fn from_raw(line: &RawLine) -> Self {
        Self {
            timestamp: None,
            timestamp_raw: None,
            timestamp_iso: None,
            source_id: line.source_id.clone(),
            host: None,
            format: LogFormat::Unstructured,
            level: Level::Info,
            level_raw: None,
            ip_src: None,
            ip_dst: None,
            ip_src_valid: false,
            ip_dst_valid: false,
            service: None,
            pid: None,
            event_id: None,
            http_status: None,
            message: line.text.clone(),
            message_raw: line.text.clone(),
            indicator_tags: BTreeSet::new(),
            peer_port: None,
            line_number: Some(line.line_number),
            day_of_week: None,
            hour_of_day: None,
            is_weekend: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Year given to syslog stamps, which carry none. Current UTC year if unset.
    #[serde(default)]
    pub assumed_year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub lines: usize,
    pub structured: usize,
    pub fallback: usize,
    pub with_timestamp: usize,
    pub by_format: BTreeMap<LogFormat, usize>,
}

impl NormalizeReport {
    fn record(&mut self, entry: &ParsedLogEntry) {
        self.lines += 1;
        if entry.format.is_structured() {
            self.structured += 1;
        } else {
            self.fallback += 1;
        }
        if entry.timestamp.is_some() {
            self.with_timestamp += 1;
        }
        *self.by_format.entry(entry.format).or_insert(0) += 1;
    }
}

pub struct Normalizer {
    timestamps: TimestampParser,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            timestamps: TimestampParser::new(config.assumed_year),
        }
    }

    pub fn timestamps(&self) -> &TimestampParser {
        &self.timestamps
    }

    pub fn normalize_line(&self, line: &RawLine) -> ParsedLogEntry {
        let mut entry = ParsedLogEntry::from_raw(line);
        for rule in rules::rules() {
            if rule.apply(&mut entry, &self.timestamps) {
                break;
            }
        }
        entry.ip_src_valid = is_ipv4(entry.ip_src.as_deref());
        entry.ip_dst_valid = is_ipv4(entry.ip_dst.as_deref());
        if entry.peer_port.is_none() {
            entry.peer_port = peer_port(&entry.message);
        }
        entry.indicator_tags = indicator_tags(&entry.message);
        entry
    }

    pub fn normalize(&self, lines: &[RawLine]) -> (Vec<ParsedLogEntry>, NormalizeReport) {
        let mut report = NormalizeReport::default();
        let entries = lines
            .iter()
            .map(|line| {
                let entry = self.normalize_line(line);
                report.record(&entry);
                entry
            })
            .collect();
        (entries, report)
    }

    /// As [`Normalizer::normalize`], checking `cancel` before every line.
    pub fn normalize_cancellable(
        &self,
        lines: &[RawLine],
        cancel: &CancelToken,
    ) -> Result<(Vec<ParsedLogEntry>, NormalizeReport), PipelineError> {
        let mut report = NormalizeReport::default();
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let entry = self.normalize_line(line);
            report.record(&entry);
            entries.push(entry);
        }
        Ok((entries, report))
    }
}

/// Normalize with default settings.
pub fn normalize(lines: &[RawLine]) -> Vec<ParsedLogEntry> {
    Normalizer::default().normalize(lines).0
}

fn is_ipv4(value: Option<&str>) -> bool {
    value.map_or(false, |v| v.parse::<Ipv4Addr>().is_ok())
}
