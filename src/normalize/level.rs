//! Canonical severity vocabulary and the synonym map shared by the
//! normalizer and the cleaner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declaration order is severity order, so `max()` picks the most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    #[default]
    Other,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

const PRIORITY: [Level; 5] = [Level::Critical, Level::Error, Level::Warning, Level::Info, Level::Debug];

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Other => "OTHER",
        }
    }

    /// Map a raw level string to the canonical vocabulary. When the string
    /// carries several level-like tokens the most severe one wins; no
    /// recognizable token gives `Other`.
    pub fn canonicalize(raw: &str) -> Level {
        raw.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| token_level(&t.to_ascii_uppercase()))
            .filter(|l| *l != Level::Other)
            .max()
            .unwrap_or(Level::Other)
    }
}

fn token_level(token: &str) -> Level {
    match token {
        "CRITICAL" | "CRIT" | "FATAL" | "EMERG" | "EMERGENCY" | "ALERT" | "PANIC" => Level::Critical,
        "ERROR" | "ERR" => Level::Error,
        "WARNING" | "WARN" => Level::Warning,
        "INFO" | "INFORMATION" | "INFORMATIONAL" | "NOTICE" => Level::Info,
        "DEBUG" | "DBG" | "TRACE" => Level::Debug,
        t if t.len() >= 3 => PRIORITY
            .iter()
            .copied()
            .find(|canon| {
                let name = canon.as_str();
                name.starts_with(t) || t.starts_with(&name[..3])
            })
            .unwrap_or(Level::Other),
        _ => Level::Other,
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
