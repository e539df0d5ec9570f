//! Pattern helpers shared by the format rules: IPv4 discovery, peer port,
//! severity tokens, embedded timestamps and indicator tags.

use regex::Regex;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("ipv4 pattern"))
}

fn severity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(ERROR|WARN|WARNING|INFO|DEBUG|CRITICAL|FATAL)\b").expect("severity pattern"))
}

fn embedded_ts_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
            .expect("timestamp pattern")
    })
}

fn port_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bport[\s:=]+(\d{1,5})\b").expect("port pattern"))
}

fn slash_port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/:(\d{1,5})\b").expect("slash port pattern"))
}

/// Valid IPv4 addresses in order of appearance.
pub fn ipv4_addresses(text: &str) -> impl Iterator<Item = &str> {
    ipv4_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|s| s.parse::<Ipv4Addr>().is_ok())
}

/// Every severity-like token in the text, joined with `|`.
pub fn severity_tokens(text: &str) -> Option<String> {
    let tokens: Vec<&str> = severity_re().find_iter(text).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join("|"))
    }
}

pub fn embedded_timestamp(text: &str) -> Option<&str> {
    embedded_ts_re().find(text).map(|m| m.as_str())
}

/// Peer port, in priority order: `port <n>`, `/:<n>`, then a trailing
/// `:<n>` on a token whose preceding segment is not purely numeric.
pub fn peer_port(text: &str) -> Option<u16> {
    let keyword = port_keyword_re()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u16>().ok())
        .next();
    if keyword.is_some() {
        return keyword;
    }
    let slash = slash_port_re()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u16>().ok())
        .next();
    if slash.is_some() {
        return slash;
    }
    text.split_whitespace().find_map(trailing_port)
}

fn trailing_port(token: &str) -> Option<u16> {
    let token = token.trim_end_matches(|c: char| matches!(c, ',' | ';' | ')' | ']' | '.' | '"' | '\''));
    let (head, digits) = token.rsplit_once(':')?;
    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let segment = head.rsplit(':').next().unwrap_or(head);
    // Clock times (`10:30:00`) have a numeric segment before the colon.
    if segment.is_empty() || segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

const TAG_CLASSES: &[(&str, &[&str])] = &[
    (
        "error",
        &["error", "errors", "fail", "failed", "failure", "invalid", "exception", "denied", "refused"],
    ),
    ("warning", &["warning", "warn", "attention", "deprecated"]),
    (
        "success",
        &["success", "successful", "succeeded", "completed", "ok", "accepted"],
    ),
    (
        "security",
        &[
            "security",
            "auth",
            "authentication",
            "password",
            "permission",
            "login",
            "logout",
            "sudo",
            "unauthorized",
            "privilege",
        ],
    ),
    (
        "network",
        &["connect", "connection", "disconnect", "receive", "received", "send", "packet", "port", "socket"],
    ),
];

/// Keyword classes present in the message as whole words, case-insensitive.
pub fn indicator_tags(message: &str) -> BTreeSet<String> {
    let lower = message.to_lowercase();
    let words: BTreeSet<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    TAG_CLASSES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| words.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}
