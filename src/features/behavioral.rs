//! Behavioral statistics over the entries of one window.

use super::stats::{counts, entropy, mean, sample_std, top_k};
use super::{FeatureVector, MESSAGE_KEYWORDS, TOP_N};
use crate::normalize::{Level, ParsedLogEntry};
use crate::schema::RoleBindings;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const BURST_EPSILON: f64 = 1e-10;

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word pattern"))
}

/// Entries of one window, bounded by `[start, end)`.
pub struct WindowStats<'a> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub actor_ip: Option<String>,
    pub entries: Vec<&'a ParsedLogEntry>,
}

impl<'a> WindowStats<'a> {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, actor_ip: Option<String>) -> Self {
        Self {
            start,
            end,
            actor_ip,
            entries: Vec::new(),
        }
    }

    pub fn to_vector(&self, bindings: &RoleBindings) -> FeatureVector {
        let mut fv = FeatureVector {
            window_start: self.start,
            window_end: self.end,
            actor_ip: self.actor_ip.clone(),
            ..Default::default()
        };
        if self.entries.is_empty() {
            return fv;
        }
        self.core(&mut fv, bindings);
        self.levels(&mut fv);
        self.actors(&mut fv);
        self.temporal(&mut fv);
        self.burstiness(&mut fv);
        self.tags(&mut fv);
        self.messages(&mut fv);
        self.ports(&mut fv);
        fv
    }

    fn core(&self, fv: &mut FeatureVector, bindings: &RoleBindings) {
        let n = self.entries.len();
        fv.event_count = n;
        fv.unique_messages = self.entries.iter().map(|e| e.message.as_str()).collect::<BTreeSet<_>>().len();
        fv.distinct_hosts = self
            .entries
            .iter()
            .filter_map(|e| bindings.host(e))
            .collect::<BTreeSet<_>>()
            .len();
        fv.distinct_processes = self
            .entries
            .iter()
            .filter_map(|e| bindings.process(e))
            .collect::<BTreeSet<_>>()
            .len();
        let lengths: Vec<f64> = self.entries.iter().map(|e| e.message.chars().count() as f64).collect();
        fv.avg_msg_length = mean(&lengths);

        let lowered: Vec<String> = self.entries.iter().map(|e| e.message.to_lowercase()).collect();
        fv.failed_auth_count = lowered.iter().filter(|m| m.contains("failed password")).count();
        fv.invalid_user_count = lowered.iter().filter(|m| m.contains("invalid user")).count();
        let tokens = counts(lowered.iter().flat_map(|m| word_re().find_iter(m).map(|t| t.as_str())));
        fv.entropy_tokens = entropy(tokens.values());
    }

    fn levels(&self, fv: &mut FeatureVector) {
        for e in &self.entries {
            match e.level {
                Level::Critical => fv.count_critical += 1,
                Level::Error => fv.count_error += 1,
                Level::Warning => fv.count_warning += 1,
                Level::Info => fv.count_info += 1,
                Level::Debug => fv.count_debug += 1,
                Level::Other => fv.count_other += 1,
            }
        }
        let n = fv.event_count as f64;
        fv.error_ratio = fv.count_error as f64 / n;
        fv.warning_ratio = fv.count_warning as f64 / n;
        fv.critical_ratio = fv.count_critical as f64 / n;
        let failing = (fv.count_error + fv.count_critical + fv.count_warning) as f64;
        let passing = (fv.count_info + fv.count_debug) as f64;
        fv.fail_success_ratio = failing / (passing + 1.0);
    }

    fn actors(&self, fv: &mut FeatureVector) {
        let src = counts(self.entries.iter().filter_map(|e| e.ip_src.as_deref()));
        let dst = counts(self.entries.iter().filter_map(|e| e.ip_dst.as_deref()));
        fv.unique_ip_src = src.len();
        fv.unique_ip_dst = dst.len();
        fv.ip_src_entropy = entropy(src.values());
        fv.ip_dst_entropy = entropy(dst.values());

        let services = counts(self.entries.iter().filter_map(|e| e.service.as_deref()));
        fv.unique_services = services.len();
        fv.service_entropy = entropy(services.values());
        fv.top_services = top_k(&services, TOP_N);

        let sources = counts(self.entries.iter().map(|e| e.source_id.as_str()));
        fv.unique_source_files = sources.len();
        fv.source_file_entropy = entropy(sources.values());
    }

    fn timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut ts: Vec<DateTime<Utc>> = self.entries.iter().filter_map(|e| e.timestamp).collect();
        ts.sort_unstable();
        ts
    }

    fn temporal(&self, fv: &mut FeatureVector) {
        let ts = self.timestamps();
        let gaps: Vec<f64> = ts
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
            .collect();
        if !gaps.is_empty() {
            fv.mean_inter_event_time = mean(&gaps);
            fv.std_inter_event_time = sample_std(&gaps);
            fv.max_inter_event_time = gaps.iter().copied().fold(f64::MIN, f64::max);
            fv.min_inter_event_time = gaps.iter().copied().fold(f64::MAX, f64::min);
        }
        if ts.is_empty() {
            return;
        }
        let hours: Vec<f64> = ts.iter().map(|t| t.hour() as f64).collect();
        fv.mean_hour = mean(&hours);
        let n = ts.len() as f64;
        fv.after_hours_ratio = ts.iter().filter(|t| t.hour() < 6 || t.hour() > 18).count() as f64 / n;
        fv.weekend_ratio = ts
            .iter()
            .filter(|t| matches!(t.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as f64
            / n;
    }

    /// One-minute buckets from the window start; defined for two or more events.
    fn burstiness(&self, fv: &mut FeatureVector) {
        if fv.event_count < 2 {
            return;
        }
        let width_ms = (self.end - self.start).num_milliseconds().max(1);
        let buckets_len = ((width_ms + 59_999) / 60_000).max(1) as usize;
        let mut buckets = vec![0usize; buckets_len];
        for ts in self.timestamps() {
            let idx = ((ts - self.start).num_milliseconds().max(0) / 60_000) as usize;
            buckets[idx.min(buckets_len - 1)] += 1;
        }
        let per_min: Vec<f64> = buckets.iter().map(|&b| b as f64).collect();
        let peak = buckets.iter().copied().max().unwrap_or(0);
        fv.peak_events_per_min = peak;
        fv.burstiness_index = peak as f64 / (mean(&per_min) + BURST_EPSILON);
        fv.events_per_min_std = sample_std(&per_min);
    }

    fn tags(&self, fv: &mut FeatureVector) {
        let tags = counts(self.entries.iter().flat_map(|e| e.indicator_tags.iter().map(String::as_str)));
        let total: usize = tags.values().sum();
        if total == 0 {
            return;
        }
        fv.total_tags_count = total;
        fv.unique_tags_count = tags.len();
        fv.tags_per_event = total as f64 / fv.event_count as f64;
        fv.tags_entropy = entropy(tags.values());
        fv.top_tags = top_k(&tags, TOP_N);
    }

    fn messages(&self, fv: &mut FeatureVector) {
        for e in &self.entries {
            let lower = e.message.to_lowercase();
            for (slot, kw) in fv.msg_keyword_counts.iter_mut().zip(MESSAGE_KEYWORDS) {
                if lower.contains(kw) {
                    *slot += 1;
                }
            }
        }
    }

    fn ports(&self, fv: &mut FeatureVector) {
        let ports: Vec<u16> = self.entries.iter().filter_map(|e| e.peer_port).collect();
        if ports.is_empty() {
            return;
        }
        let values: Vec<f64> = ports.iter().copied().map(f64::from).collect();
        fv.unique_ports = ports.iter().collect::<BTreeSet<_>>().len();
        fv.port_min = ports.iter().copied().min().map_or(0.0, f64::from);
        fv.port_max = ports.iter().copied().max().map_or(0.0, f64::from);
        fv.port_mean = mean(&values);
        fv.port_std = sample_std(&values);
    }
}
