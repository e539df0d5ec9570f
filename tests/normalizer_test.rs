//! Normalizer: format cascade, field aliases, heuristics on unstructured lines.

use chrono::{TimeZone, Utc};
use log_triage::{
    normalize::{Normalizer, NormalizerConfig},
    schema::Field,
    Level, LogFormat, RawLine,
};
use proptest::prelude::*;

fn normalizer() -> Normalizer {
    Normalizer::new(&NormalizerConfig {
        assumed_year: Some(2024),
    })
}

fn one(text: &str) -> log_triage::ParsedLogEntry {
    normalizer().normalize_line(&RawLine::new(text, "test.log", 1))
}

#[test]
fn sshd_failed_password() {
    let e = one("Dec 10 07:07:45 LabSZ sshd[24206]: Failed password for invalid user test9 from 52.80.34.196 port 36060 ssh2");
    assert_eq!(e.format, LogFormat::Syslog);
    assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 12, 10, 7, 7, 45).unwrap()));
    assert_eq!(e.timestamp_raw.as_deref(), Some("Dec 10 07:07:45"));
    assert_eq!(e.host.as_deref(), Some("LabSZ"));
    assert_eq!(e.service.as_deref(), Some("sshd"));
    assert_eq!(e.pid, Some(24206));
    assert_eq!(e.ip_src.as_deref(), Some("52.80.34.196"));
    assert!(e.ip_src_valid);
    assert_eq!(e.ip_dst, None);
    assert_eq!(e.peer_port, Some(36060));
    assert_eq!(e.level, Level::Info);
    for tag in ["error", "security", "network"] {
        assert!(e.indicator_tags.contains(tag), "missing tag {}", tag);
    }
    assert!(e.message.starts_with("Failed password"));
    assert!(e.message_raw.starts_with("Dec 10 07:07:45"));
    assert_eq!(e.line_number, Some(1));
}

#[test]
fn syslog_priority_prefix() {
    let e = one("<13>Dec 10 07:07:45 host sshd[1]: Failed password for root from 10.0.0.1 port 22 ssh2");
    assert_eq!(e.format, LogFormat::Syslog);
    assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 12, 10, 7, 7, 45).unwrap()));
    assert_eq!(e.timestamp_raw.as_deref(), Some("Dec 10 07:07:45"));
    assert_eq!(e.host.as_deref(), Some("host"));
    assert_eq!(e.service.as_deref(), Some("sshd"));
    assert_eq!(e.pid, Some(1));
    assert_eq!(e.ip_src.as_deref(), Some("10.0.0.1"));
    assert_eq!(e.peer_port, Some(22));
    assert!(e.message.starts_with("Failed password"));
    assert!(e.message_raw.starts_with("<13>Dec 10"));

    let received = normalizer().normalize_line(&RawLine::new(
        "<134>Mar 14 18:30:00 fw01 kernel: DROP IN=eth0",
        "udp://127.0.0.1:514",
        7,
    ));
    assert_eq!(received.format, LogFormat::Syslog);
    assert_eq!(received.host.as_deref(), Some("fw01"));
    assert_eq!(received.service.as_deref(), Some("kernel"));
    assert_eq!(received.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 14, 18, 30, 0).unwrap()));
}

#[test]
fn access_log_status_levels() {
    let line = |status: u16| {
        format!(
            r#"203.0.113.9 - - [10/Oct/2000:13:55:36 -0700] "GET /admin HTTP/1.0" {} 2326 "-" "curl/8.0""#,
            status
        )
    };
    let ok = one(&line(200));
    assert_eq!(ok.format, LogFormat::AccessLog);
    assert_eq!(ok.http_status, Some(200));
    assert_eq!(ok.level, Level::Info);
    assert_eq!(ok.ip_src.as_deref(), Some("203.0.113.9"));
    assert_eq!(ok.timestamp, Some(Utc.with_ymd_and_hms(2000, 10, 10, 20, 55, 36).unwrap()));

    assert_eq!(one(&line(404)).level, Level::Warning);
    assert_eq!(one(&line(503)).level, Level::Error);
}

#[test]
fn windows_event() {
    let e = one("TimeGenerated: 2024-03-01 10:15:00, EventID: 4625, Level: Error, Source: Microsoft-Windows-Security-Auditing, Message: An account failed to log on from 10.1.2.3");
    assert_eq!(e.format, LogFormat::WindowsEvent);
    assert_eq!(e.event_id, Some(4625));
    assert_eq!(e.level, Level::Error);
    assert_eq!(e.service.as_deref(), Some("Microsoft-Windows-Security-Auditing"));
    assert_eq!(e.ip_src.as_deref(), Some("10.1.2.3"));
    assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()));
    assert!(e.indicator_tags.contains("error"));
}

#[test]
fn iso_line_with_offset_and_bracketed_level() {
    let e = one("2024-03-01T10:15:00+02:00 [WARN] disk almost full on 10.0.0.7 and 10.0.0.8");
    assert_eq!(e.format, LogFormat::Iso8601);
    assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap()));
    assert_eq!(e.level, Level::Warning);
    assert_eq!(e.level_raw.as_deref(), Some("WARN"));
    assert_eq!(e.message, "disk almost full on 10.0.0.7 and 10.0.0.8");
    assert_eq!(e.ip_src.as_deref(), Some("10.0.0.7"));
    assert_eq!(e.ip_dst.as_deref(), Some("10.0.0.8"));
}

#[test]
fn unstructured_fallback_heuristics() {
    let e = one("worker error, WARN retry from 192.168.1.1 to 10.0.0.2 stamp 2024-01-05 03:04:05");
    assert_eq!(e.format, LogFormat::Unstructured);
    assert_eq!(e.level, Level::Error);
    assert_eq!(e.ip_src.as_deref(), Some("192.168.1.1"));
    assert_eq!(e.ip_dst.as_deref(), Some("10.0.0.2"));
    assert_eq!(e.timestamp, Some(Utc.with_ymd_and_hms(2024, 1, 5, 3, 4, 5).unwrap()));
    assert_eq!(e.message, e.message_raw);
}

#[test]
fn unstructured_without_signals() {
    let e = one("just some words");
    assert_eq!(e.format, LogFormat::Unstructured);
    assert_eq!(e.level, Level::Info);
    assert_eq!(e.timestamp, None);
    assert_eq!(e.ip_src, None);
    assert!(e.indicator_tags.is_empty());
}

#[test]
fn invalid_octets_are_not_addresses() {
    let e = one("Dec 10 07:07:45 host app: peer 300.1.2.3 then 10.9.8.7");
    assert_eq!(e.ip_src.as_deref(), Some("10.9.8.7"));
}

#[test]
fn clock_times_are_not_ports() {
    assert_eq!(one("job finished at 10:30:00 today").peer_port, None);
    assert_eq!(one("upstream db.internal:5432 timed out").peer_port, Some(5432));
    assert_eq!(one("listening on PORT 8080").peer_port, Some(8080));
    assert_eq!(one("connect to port 99999").peer_port, None);
}

#[test]
fn alias_resolution() {
    assert_eq!(Field::resolve("process"), Some(Field::Service));
    assert_eq!(Field::resolve("Source"), Some(Field::Service));
    assert_eq!(Field::resolve("program"), Some(Field::Service));
    assert_eq!(Field::resolve("source_file"), Some(Field::SourceId));
    assert_eq!(Field::resolve("Source-File"), Some(Field::SourceId));
    assert_eq!(Field::resolve("HOSTNAME"), Some(Field::Host));
    assert_eq!(Field::resolve("src_ip"), Some(Field::IpSrc));
    assert_eq!(Field::resolve("dst_ip"), Some(Field::IpDst));
    assert_eq!(Field::resolve("msg"), Some(Field::Message));
    assert_eq!(Field::resolve("severity"), Some(Field::Level));
    assert_eq!(Field::resolve("status"), Some(Field::HttpStatus));
    assert_eq!(Field::resolve("EventID"), Some(Field::EventId));
    assert_eq!(Field::resolve("user_agent"), None);
}

#[test]
fn report_counts_formats() {
    let lines = vec![
        RawLine::new("Dec 10 07:07:45 LabSZ sshd[1]: Accepted password for bob", "a", 1),
        RawLine::new("2024-03-01T10:15:00Z [INFO] ok", "a", 2),
        RawLine::new("free text", "a", 3),
    ];
    let (entries, report) = normalizer().normalize(&lines);
    assert_eq!(entries.len(), 3);
    assert_eq!(report.lines, 3);
    assert_eq!(report.structured, 2);
    assert_eq!(report.fallback, 1);
    assert_eq!(report.with_timestamp, 2);
    assert_eq!(report.by_format.get(&LogFormat::Syslog), Some(&1));
}

proptest! {
    #[test]
    fn normalize_is_total(texts in prop::collection::vec(".{0,120}", 0..40)) {
        let lines: Vec<RawLine> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| RawLine::new(t.as_str(), "prop", i as u64 + 1))
            .collect();
        let out = log_triage::normalize::normalize(&lines);
        prop_assert_eq!(out.len(), lines.len());
        for (entry, line) in out.iter().zip(&lines) {
            prop_assert_eq!(&entry.message_raw, &line.text);
        }
    }

    #[test]
    fn structured_prefixes_never_panic(
        day in 1u32..29,
        msg in "[ -~]{0,80}",
    ) {
        let line = format!("Jan {:2} 00:00:01 h p[1]: {}", day, msg);
        let e = normalizer().normalize_line(&RawLine::new(line, "prop", 1));
        prop_assert_eq!(e.format, LogFormat::Syslog);
        prop_assert!(e.timestamp.is_some());
    }
}
