//! Windowed statistical feature extraction from cleaned entries.

mod behavioral;
mod pipeline;
pub mod stats;

pub use behavioral::WindowStats;
pub use pipeline::{extract, ExtractReport, FeatureExtractor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of top services and tags carried per window.
pub const TOP_N: usize = 3;

/// Keywords counted per message for `msg_<kw>_count`.
pub const MESSAGE_KEYWORDS: [&str; 8] = [
    "connect",
    "connection",
    "request",
    "received",
    "establish",
    "open",
    "close",
    "terminate",
];

/// The eight core features, which lead the export table.
pub const CORE_COLUMNS: [&str; 8] = [
    "event_count",
    "unique_messages",
    "distinct_hosts",
    "distinct_processes",
    "avg_msg_length",
    "failed_auth_count",
    "invalid_user_count",
    "entropy_tokens",
];

/// Feature vector for one window (and actor, when grouping by actor).
/// Every window carries the same schema; undefined features are 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub actor_ip: Option<String>,

    pub event_count: usize,
    pub unique_messages: usize,
    pub distinct_hosts: usize,
    pub distinct_processes: usize,
    pub avg_msg_length: f64,
    pub failed_auth_count: usize,
    pub invalid_user_count: usize,
    pub entropy_tokens: f64,

    pub count_critical: usize,
    pub count_error: usize,
    pub count_warning: usize,
    pub count_info: usize,
    pub count_debug: usize,
    pub count_other: usize,
    pub error_ratio: f64,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
    pub fail_success_ratio: f64,

    pub unique_ip_src: usize,
    pub unique_ip_dst: usize,
    pub ip_src_entropy: f64,
    pub ip_dst_entropy: f64,

    pub unique_services: usize,
    pub service_entropy: f64,
    /// Most frequent services with their relative frequency.
    pub top_services: Vec<(String, f64)>,

    /// Inter-event gaps, seconds.
    pub mean_inter_event_time: f64,
    pub std_inter_event_time: f64,
    pub max_inter_event_time: f64,
    pub min_inter_event_time: f64,
    pub mean_hour: f64,
    pub after_hours_ratio: f64,
    pub weekend_ratio: f64,

    pub peak_events_per_min: usize,
    pub burstiness_index: f64,
    pub events_per_min_std: f64,

    pub total_tags_count: usize,
    pub unique_tags_count: usize,
    pub tags_per_event: f64,
    pub tags_entropy: f64,
    pub top_tags: Vec<(String, f64)>,

    /// Messages containing each of [`MESSAGE_KEYWORDS`], in that order.
    pub msg_keyword_counts: [usize; 8],

    pub unique_ports: usize,
    pub port_min: f64,
    pub port_max: f64,
    pub port_mean: f64,
    pub port_std: f64,

    pub unique_source_files: usize,
    pub source_file_entropy: f64,
}

impl FeatureVector {
    /// Every numeric feature by column name, core features first. This is
    /// the projection the detectors see.
    pub fn numeric_features(&self) -> Vec<(&'static str, f64)> {
        let mut out: Vec<(&'static str, f64)> = vec![
            ("event_count", self.event_count as f64),
            ("unique_messages", self.unique_messages as f64),
            ("distinct_hosts", self.distinct_hosts as f64),
            ("distinct_processes", self.distinct_processes as f64),
            ("avg_msg_length", self.avg_msg_length),
            ("failed_auth_count", self.failed_auth_count as f64),
            ("invalid_user_count", self.invalid_user_count as f64),
            ("entropy_tokens", self.entropy_tokens),
            ("count_critical", self.count_critical as f64),
            ("count_error", self.count_error as f64),
            ("count_warning", self.count_warning as f64),
            ("count_info", self.count_info as f64),
            ("count_debug", self.count_debug as f64),
            ("count_other", self.count_other as f64),
            ("error_ratio", self.error_ratio),
            ("warning_ratio", self.warning_ratio),
            ("critical_ratio", self.critical_ratio),
            ("fail_success_ratio", self.fail_success_ratio),
            ("unique_ip_src", self.unique_ip_src as f64),
            ("unique_ip_dst", self.unique_ip_dst as f64),
            ("ip_src_entropy", self.ip_src_entropy),
            ("ip_dst_entropy", self.ip_dst_entropy),
            ("unique_services", self.unique_services as f64),
            ("service_entropy", self.service_entropy),
            ("mean_inter_event_time", self.mean_inter_event_time),
            ("std_inter_event_time", self.std_inter_event_time),
            ("max_inter_event_time", self.max_inter_event_time),
            ("min_inter_event_time", self.min_inter_event_time),
            ("mean_hour", self.mean_hour),
            ("after_hours_ratio", self.after_hours_ratio),
            ("weekend_ratio", self.weekend_ratio),
            ("peak_events_per_min", self.peak_events_per_min as f64),
            ("burstiness_index", self.burstiness_index),
            ("events_per_min_std", self.events_per_min_std),
            ("total_tags_count", self.total_tags_count as f64),
            ("unique_tags_count", self.unique_tags_count as f64),
            ("tags_per_event", self.tags_per_event),
            ("tags_entropy", self.tags_entropy),
        ];
        const KEYWORD_COLUMNS: [&str; 8] = [
            "msg_connect_count",
            "msg_connection_count",
            "msg_request_count",
            "msg_received_count",
            "msg_establish_count",
            "msg_open_count",
            "msg_close_count",
            "msg_terminate_count",
        ];
        out.extend(
            KEYWORD_COLUMNS
                .iter()
                .zip(self.msg_keyword_counts.iter())
                .map(|(name, n)| (*name, *n as f64)),
        );
        out.extend([
            ("unique_ports", self.unique_ports as f64),
            ("port_min", self.port_min),
            ("port_max", self.port_max),
            ("port_mean", self.port_mean),
            ("port_std", self.port_std),
            ("unique_source_files", self.unique_source_files as f64),
            ("source_file_entropy", self.source_file_entropy),
        ]);
        out
    }

    /// Numeric column names in [`FeatureVector::numeric_features`] order.
    pub fn numeric_columns() -> Vec<&'static str> {
        FeatureVector::default()
            .numeric_features()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    pub fn top_service(&self, rank: usize) -> Option<&(String, f64)> {
        self.top_services.get(rank)
    }

    pub fn top_tag(&self, rank: usize) -> Option<&(String, f64)> {
        self.top_tags.get(rank)
    }
}
