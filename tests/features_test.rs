//! Windowed feature extraction: tiling, actor grouping, core features, entropy.

use chrono::{DateTime, Duration, TimeZone, Utc};
use log_triage::{
    clean::clean,
    error::ConfigError,
    features::{extract, stats, FeatureExtractor},
    normalize::{Normalizer, NormalizerConfig},
    FeatureVector, Level, ParsedLogEntry, RawLine,
};
use proptest::prelude::*;

fn entries(lines: &[&str]) -> Vec<ParsedLogEntry> {
    let raw: Vec<RawLine> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| RawLine::new(*l, "auth.log", i as u64 + 1))
        .collect();
    let parsed = Normalizer::new(&NormalizerConfig {
        assumed_year: Some(2024),
    })
    .normalize(&raw)
    .0;
    clean(parsed).entries
}

fn at(t: DateTime<Utc>, line: u64) -> ParsedLogEntry {
    let mut e = ParsedLogEntry::from_raw(&RawLine::new("event", "gen.log", line));
    e.timestamp = Some(t);
    e
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}

fn tagged(mut e: ParsedLogEntry, level: Level, source: &str, tags: &[&str]) -> ParsedLogEntry {
    e.level = level;
    e.source_id = source.to_string();
    e.indicator_tags = tags.iter().map(|t| t.to_string()).collect();
    e
}

fn ranked(pairs: &[(String, f64)]) -> Vec<&str> {
    pairs.iter().map(|(k, _)| k.as_str()).collect()
}

const SSHD: [&str; 6] = [
    "Dec 10 07:07:45 LabSZ sshd[24206]: Failed password for invalid user test9 from 52.80.34.196 port 36060 ssh2",
    "Dec 10 07:07:46 LabSZ sshd[24206]: Invalid user test9 from 52.80.34.196",
    "Dec 10 07:07:47 LabSZ sshd[24206]: input_userauth_request: invalid user test9 [preauth]",
    "Dec 10 07:07:49 LabSZ sshd[24208]: Failed password for root from 52.80.34.196 port 36062 ssh2",
    "Dec 10 07:07:52 LabSZ sshd[24208]: Connection closed by 52.80.34.196 [preauth]",
    "Dec 10 07:07:55 LabSZ sshd[24208]: Received disconnect from 52.80.34.196: 11: Bye Bye [preauth]",
];

#[test]
fn six_sshd_failures_one_window() {
    let vectors = extract(&entries(&SSHD), 60, false).unwrap();
    assert_eq!(vectors.len(), 1);
    let fv = &vectors[0];
    assert_eq!(fv.event_count, 6);
    assert_eq!(fv.failed_auth_count, 2);
    assert_eq!(fv.invalid_user_count, 3);
    assert_eq!(fv.distinct_hosts, 1);
    assert_eq!(fv.distinct_processes, 1);
    assert_eq!(fv.unique_ip_src, 1);
    assert_eq!(fv.ip_src_entropy, 0.0);
    assert_eq!(fv.unique_services, 1);
    assert_eq!(fv.top_services, vec![("sshd".to_string(), 1.0)]);
    assert_eq!(fv.count_info, 6);
    assert_eq!(fv.unique_ports, 2);
    assert_eq!(fv.port_min, 36060.0);
    assert_eq!(fv.port_max, 36062.0);
    assert_eq!(fv.msg_keyword_counts[1], 1);
    assert_eq!(fv.min_inter_event_time, 1.0);
    assert_eq!(fv.max_inter_event_time, 3.0);
    assert_eq!(fv.mean_hour, 7.0);
    assert_eq!(fv.after_hours_ratio, 0.0);
    assert_eq!(fv.unique_source_files, 1);
    assert!(fv.entropy_tokens > 0.0);
    assert_eq!(fv.window_start, Utc.with_ymd_and_hms(2024, 12, 10, 7, 7, 45).unwrap());
    assert_eq!(fv.window_end - fv.window_start, Duration::seconds(60));
}

#[test]
fn zero_window_is_config_error() {
    assert!(matches!(extract(&[], 0, false), Err(ConfigError::InvalidWindow(0))));
    assert!(FeatureExtractor::new(0, true).is_err());
}

#[test]
fn empty_input_keeps_schema() {
    let vectors = extract(&[], 60, false).unwrap();
    assert!(vectors.is_empty());
    assert_eq!(FeatureVector::numeric_columns().len(), FeatureVector::default().numeric_features().len());
    assert!(!FeatureVector::numeric_columns().is_empty());
}

#[test]
fn untimed_excluded_and_gaps_counted() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut input = vec![at(t0, 1), at(t0 + Duration::seconds(250), 2)];
    input.push(ParsedLogEntry::from_raw(&RawLine::new("no time", "gen.log", 3)));
    let (vectors, report) = FeatureExtractor::new(60, false).unwrap().extract(&input);
    assert_eq!(vectors.len(), 2);
    assert_eq!(report.untimed_entries, 1);
    assert_eq!(report.windows_emitted, 2);
    assert_eq!(report.empty_windows_skipped, 3);
    assert_eq!(vectors[1].window_start, t0 + Duration::seconds(240));
}

#[test]
fn group_by_actor_splits_windows() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut a = at(t0, 1);
    a.ip_src = Some("10.0.0.1".to_string());
    let mut b = at(t0 + Duration::seconds(5), 2);
    b.ip_src = Some("10.0.0.2".to_string());
    let mut c = at(t0 + Duration::seconds(6), 3);
    c.ip_src = Some("10.0.0.1".to_string());
    let d = at(t0 + Duration::seconds(7), 4);

    let vectors = extract(&[a, b, c, d], 60, true).unwrap();
    let keys: Vec<(Option<&str>, usize)> = vectors
        .iter()
        .map(|v| (v.actor_ip.as_deref(), v.event_count))
        .collect();
    assert_eq!(keys, vec![(None, 1), (Some("10.0.0.1"), 2), (Some("10.0.0.2"), 1)]);
    assert!(vectors.iter().all(|v| v.window_start == t0));
}

#[test]
fn burstiness_single_minute_window() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let input: Vec<ParsedLogEntry> = (0..4).map(|i| at(t0 + Duration::seconds(i * 10), i as u64 + 1)).collect();
    let fv = &extract(&input, 60, false).unwrap()[0];
    assert_eq!(fv.peak_events_per_min, 4);
    assert!((fv.burstiness_index - 1.0).abs() < 1e-6);
    assert_eq!(fv.events_per_min_std, 0.0);

    let lone = &extract(&input[..1], 60, false).unwrap()[0];
    assert_eq!(lone.peak_events_per_min, 0);
    assert_eq!(lone.burstiness_index, 0.0);
}

#[test]
fn weekend_mixed_level_window() {
    // Saturday, 03:00 UTC.
    let t0 = Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap();

    let mut e1 = tagged(at(t0, 1), Level::Error, "a.log", &["error", "security"]);
    e1.service = Some("sshd".to_string());
    e1.ip_src = Some("10.0.0.1".to_string());
    e1.ip_dst = Some("10.0.0.9".to_string());
    e1.peer_port = Some(22);

    let mut e2 = tagged(at(t0 + Duration::seconds(1), 2), Level::Warning, "a.log", &["error", "network"]);
    e2.service = Some("sshd".to_string());
    e2.ip_src = Some("10.0.0.2".to_string());
    e2.ip_dst = Some("10.0.0.9".to_string());
    e2.peer_port = Some(2222);

    let mut e3 = tagged(at(t0 + Duration::seconds(2), 3), Level::Info, "b.log", &["success"]);
    e3.service = Some("cron".to_string());
    e3.ip_src = Some("10.0.0.1".to_string());
    e3.ip_dst = Some("10.0.0.8".to_string());

    let mut e4 = tagged(at(t0 + Duration::seconds(200), 4), Level::Critical, "a.log", &["security"]);
    e4.service = Some("sshd".to_string());

    let vectors = extract(&[e1, e2, e3, e4], 300, false).unwrap();
    assert_eq!(vectors.len(), 1);
    let fv = &vectors[0];
    assert_eq!(fv.event_count, 4);

    assert_eq!((fv.count_critical, fv.count_error, fv.count_warning, fv.count_info), (1, 1, 1, 1));
    assert!(close(fv.error_ratio, 0.25));
    assert!(close(fv.warning_ratio, 0.25));
    assert!(close(fv.critical_ratio, 0.25));
    // (error + critical + warning) / (info + debug + 1)
    assert!(close(fv.fail_success_ratio, 1.5));

    assert_eq!(fv.total_tags_count, 6);
    assert_eq!(fv.unique_tags_count, 4);
    assert!(close(fv.tags_per_event, 1.5));
    let tags_entropy = (2.0 / 3.0) * 3f64.log2() + (1.0 / 3.0) * 6f64.log2();
    assert!(close(fv.tags_entropy, tags_entropy));
    assert_eq!(ranked(&fv.top_tags), vec!["error", "security", "network"]);
    assert!(close(fv.top_tags[0].1, 1.0 / 3.0));
    assert!(close(fv.top_tags[1].1, 1.0 / 3.0));
    assert!(close(fv.top_tags[2].1, 1.0 / 6.0));

    let three_to_one = -(0.75 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
    let two_to_one = -((2.0 / 3.0) * (2.0f64 / 3.0).log2() + (1.0 / 3.0) * (1.0f64 / 3.0).log2());
    assert_eq!(fv.unique_services, 2);
    assert!(close(fv.service_entropy, three_to_one));
    assert_eq!(ranked(&fv.top_services), vec!["sshd", "cron"]);
    assert!(close(fv.top_services[0].1, 0.75));
    assert!(close(fv.top_services[1].1, 0.25));
    assert_eq!((fv.unique_ip_src, fv.unique_ip_dst), (2, 2));
    assert!(close(fv.ip_src_entropy, two_to_one));
    assert!(close(fv.ip_dst_entropy, two_to_one));
    assert_eq!(fv.unique_source_files, 2);
    assert!(close(fv.source_file_entropy, three_to_one));

    assert_eq!(fv.unique_ports, 2);
    assert_eq!((fv.port_min, fv.port_max), (22.0, 2222.0));
    assert!(close(fv.port_mean, 1122.0));
    assert!(close(fv.port_std, 2200.0 / 2f64.sqrt()));

    // Gaps of 1, 1 and 198 seconds.
    let m: f64 = 200.0 / 3.0;
    let gap_std = (((1.0 - m) * (1.0 - m) * 2.0 + (198.0 - m) * (198.0 - m)) / 2.0).sqrt();
    assert!(close(fv.mean_inter_event_time, m));
    assert!(close(fv.std_inter_event_time, gap_std));
    assert_eq!(fv.max_inter_event_time, 198.0);
    assert_eq!(fv.min_inter_event_time, 1.0);
    assert_eq!(fv.mean_hour, 3.0);
    assert_eq!(fv.weekend_ratio, 1.0);
    assert_eq!(fv.after_hours_ratio, 1.0);

    // Per-minute buckets [3, 0, 0, 1, 0].
    assert_eq!(fv.peak_events_per_min, 3);
    assert!(close(fv.burstiness_index, 3.75));
    assert!(close(fv.events_per_min_std, 1.7f64.sqrt()));
}

#[test]
fn burstiness_partial_last_minute() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let input: Vec<ParsedLogEntry> = [0, 10, 89]
        .iter()
        .enumerate()
        .map(|(i, s)| at(t0 + Duration::seconds(*s), i as u64 + 1))
        .collect();
    let fv = &extract(&input, 90, false).unwrap()[0];
    // Two buckets: [0s, 60s) and the 30-second remainder.
    assert_eq!(fv.peak_events_per_min, 2);
    assert!(close(fv.burstiness_index, 2.0 / 1.5));
    assert!(close(fv.events_per_min_std, 0.5f64.sqrt()));
}

#[test]
fn evening_boundary_and_tag_ties() {
    // Monday.
    let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 18, 30, 0).unwrap();
    let input = vec![
        tagged(at(t0, 1), Level::Info, "a.log", &["success", "warning"]),
        tagged(at(t0 + Duration::minutes(29), 2), Level::Info, "a.log", &["success", "network"]),
        tagged(at(t0 + Duration::minutes(40), 3), Level::Info, "a.log", &["success", "warning", "network"]),
        tagged(at(t0 + Duration::minutes(50), 4), Level::Info, "a.log", &["error"]),
    ];
    let vectors = extract(&input, 3600, false).unwrap();
    assert_eq!(vectors.len(), 1);
    let fv = &vectors[0];

    // 18:xx is inside working hours, 19:xx is not.
    assert_eq!(fv.after_hours_ratio, 0.5);
    assert_eq!(fv.mean_hour, 18.5);
    assert_eq!(fv.weekend_ratio, 0.0);
    assert_eq!(fv.fail_success_ratio, 0.0);

    assert_eq!(fv.total_tags_count, 8);
    assert_eq!(ranked(&fv.top_tags), vec!["success", "network", "warning"]);
    assert!(close(fv.top_tags[0].1, 0.375));
    assert!(close(fv.top_tags[1].1, 0.25));
    assert!(close(fv.top_tags[2].1, 0.25));

    assert_eq!(fv.peak_events_per_min, 1);
    assert!(close(fv.burstiness_index, 15.0));
}

#[test]
fn entropy_bounds() {
    assert_eq!(stats::entropy([7usize].iter()), 0.0);
    assert_eq!(stats::entropy(Vec::<usize>::new().iter()), 0.0);
    for k in 2..10usize {
        let counts = vec![3usize; k];
        assert!((stats::entropy(counts.iter()) - (k as f64).log2()).abs() < 1e-9);
    }
}

proptest! {
    #[test]
    fn windows_tile_timestamps(
        offsets in prop::collection::vec(0i64..20_000, 1..60),
        width in 1u64..900,
    ) {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let input: Vec<ParsedLogEntry> = offsets
            .iter()
            .enumerate()
            .map(|(i, s)| at(t0 + Duration::seconds(*s), i as u64 + 1))
            .collect();
        let vectors = extract(&input, width, false).unwrap();

        let min = input.iter().filter_map(|e| e.timestamp).min().unwrap();
        let max = input.iter().filter_map(|e| e.timestamp).max().unwrap();
        let w = Duration::seconds(width as i64);

        prop_assert_eq!(vectors.iter().map(|v| v.event_count).sum::<usize>(), input.len());
        prop_assert_eq!(vectors[0].window_start, min);
        prop_assert!(vectors.last().unwrap().window_end > max);
        for pair in vectors.windows(2) {
            prop_assert!(pair[0].window_end <= pair[1].window_start);
        }
        for v in &vectors {
            prop_assert_eq!(v.window_end - v.window_start, w);
            prop_assert_eq!((v.window_start - min).num_seconds() % width as i64, 0);
        }
        for e in &input {
            let ts = e.timestamp.unwrap();
            let holders = vectors.iter().filter(|v| v.window_start <= ts && ts < v.window_end).count();
            prop_assert_eq!(holders, 1);
        }
    }
}
