//! Canonical entry fields and the declared alias table that reconciles naming
//! drift between log formats, config files and the feature extractor.
//!
//! Every external name (a regex capture group, a binding in the config file)
//! goes through [`Field::resolve`]; nothing looks fields up by string at
//! extraction time.

use crate::error::ConfigError;
use crate::normalize::ParsedLogEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Timestamp,
    SourceId,
    Host,
    Level,
    IpSrc,
    IpDst,
    Service,
    Pid,
    EventId,
    HttpStatus,
    Message,
    PeerPort,
    LineNumber,
}

/// External name → canonical field. Keys are lowercase snake_case.
pub const FIELD_ALIASES: &[(&str, Field)] = &[
    ("timestamp", Field::Timestamp),
    ("time", Field::Timestamp),
    ("datetime", Field::Timestamp),
    ("timegenerated", Field::Timestamp),
    ("source_id", Field::SourceId),
    ("source_file", Field::SourceId),
    ("file", Field::SourceId),
    ("host", Field::Host),
    ("hostname", Field::Host),
    ("computer", Field::Host),
    ("level", Field::Level),
    ("severity", Field::Level),
    ("loglevel", Field::Level),
    ("log_level", Field::Level),
    ("ip", Field::IpSrc),
    ("ip_src", Field::IpSrc),
    ("src_ip", Field::IpSrc),
    ("source_ip", Field::IpSrc),
    ("client_ip", Field::IpSrc),
    ("ip_dst", Field::IpDst),
    ("dst_ip", Field::IpDst),
    ("dest_ip", Field::IpDst),
    ("destination_ip", Field::IpDst),
    ("service", Field::Service),
    ("process", Field::Service),
    ("program", Field::Service),
    ("source", Field::Service),
    ("app", Field::Service),
    ("pid", Field::Pid),
    ("process_id", Field::Pid),
    ("event_id", Field::EventId),
    ("eventid", Field::EventId),
    ("status", Field::HttpStatus),
    ("status_code", Field::HttpStatus),
    ("http_status", Field::HttpStatus),
    ("message", Field::Message),
    ("msg", Field::Message),
    ("peer_port", Field::PeerPort),
    ("port", Field::PeerPort),
    ("line_number", Field::LineNumber),
    ("lineno", Field::LineNumber),
    ("line", Field::LineNumber),
];

impl Field {
    /// Resolve an external name through [`FIELD_ALIASES`].
    pub fn resolve(name: &str) -> Option<Field> {
        let key: String = name
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' | '.' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        FIELD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, field)| *field)
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::SourceId => "source_id",
            Field::Host => "host",
            Field::Level => "level",
            Field::IpSrc => "ip_src",
            Field::IpDst => "ip_dst",
            Field::Service => "service",
            Field::Pid => "pid",
            Field::EventId => "event_id",
            Field::HttpStatus => "http_status",
            Field::Message => "message",
            Field::PeerPort => "peer_port",
            Field::LineNumber => "line_number",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            Field::SourceId
                | Field::Host
                | Field::IpSrc
                | Field::IpDst
                | Field::Service
                | Field::Message
        )
    }

    /// Text value of this field on `entry`; `None` for non-text fields.
    pub fn text(self, entry: &ParsedLogEntry) -> Option<&str> {
        match self {
            Field::SourceId => Some(entry.source_id.as_str()),
            Field::Host => entry.host.as_deref(),
            Field::IpSrc => entry.ip_src.as_deref(),
            Field::IpDst => entry.ip_dst.as_deref(),
            Field::Service => entry.service.as_deref(),
            Field::Message => Some(entry.message.as_str()),
            _ => None,
        }
        .filter(|s| !s.is_empty())
    }
}

/// Extractor roles bound to entry fields by name, as written in the config.
/// The first field with a value wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBindings {
    pub host: Vec<String>,
    pub process: Vec<String>,
}

impl Default for FieldBindings {
    fn default() -> Self {
        Self {
            host: vec!["host".to_string(), "source_file".to_string()],
            process: vec!["process".to_string()],
        }
    }
}

impl FieldBindings {
    pub fn resolve(&self) -> Result<RoleBindings, ConfigError> {
        Ok(RoleBindings {
            host: resolve_role("host", &self.host)?,
            process: resolve_role("process", &self.process)?,
        })
    }
}

fn resolve_role(role: &'static str, names: &[String]) -> Result<Vec<Field>, ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::EmptyBinding(role));
    }
    names
        .iter()
        .map(|name| {
            let field = Field::resolve(name).ok_or_else(|| ConfigError::UnknownField(name.clone()))?;
            if !field.is_text() {
                return Err(ConfigError::NonTextBinding {
                    role,
                    field: name.clone(),
                });
            }
            Ok(field)
        })
        .collect()
}

/// Resolved role bindings used by the feature extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBindings {
    host: Vec<Field>,
    process: Vec<Field>,
}

impl Default for RoleBindings {
    fn default() -> Self {
        Self {
            host: vec![Field::Host, Field::SourceId],
            process: vec![Field::Service],
        }
    }
}

impl RoleBindings {
    pub fn host<'a>(&self, entry: &'a ParsedLogEntry) -> Option<&'a str> {
        first_text(&self.host, entry)
    }

    pub fn process<'a>(&self, entry: &'a ParsedLogEntry) -> Option<&'a str> {
        first_text(&self.process, entry)
    }
}

fn first_text<'a>(fields: &[Field], entry: &'a ParsedLogEntry) -> Option<&'a str> {
    fields.iter().find_map(|f| f.text(entry))
}
