//! Feature extraction pipeline: entries → tumbling windows → behavioral
//! stats → vector.

use super::{FeatureVector, WindowStats};
use crate::cancel::CancelToken;
use crate::error::{ConfigError, PipelineError};
use crate::normalize::ParsedLogEntry;
use crate::schema::RoleBindings;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Upper bound on the window width (about a century).
const MAX_WINDOW_SECONDS: u64 = 100 * 366 * 24 * 3600;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub windows_emitted: usize,
    /// Windows between the first and last timestamp with no entries.
    pub empty_windows_skipped: usize,
    pub untimed_entries: usize,
}

pub struct FeatureExtractor {
    window_seconds: u64,
    group_by_actor: bool,
    bindings: RoleBindings,
}

impl FeatureExtractor {
    pub fn new(window_seconds: u64, group_by_actor: bool) -> Result<Self, ConfigError> {
        if window_seconds == 0 || window_seconds > MAX_WINDOW_SECONDS {
            return Err(ConfigError::InvalidWindow(window_seconds));
        }
        Ok(Self {
            window_seconds,
            group_by_actor,
            bindings: RoleBindings::default(),
        })
    }

    pub fn with_bindings(mut self, bindings: RoleBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn extract(&self, entries: &[ParsedLogEntry]) -> (Vec<FeatureVector>, ExtractReport) {
        match self.extract_cancellable(entries, &CancelToken::new()) {
            Ok(out) => out,
            // A fresh token is never cancelled.
            Err(_) => Default::default(),
        }
    }

    /// Windows are anchored at the earliest timestamp; an entry at `ts`
    /// falls in window `floor((ts - min) / W)`. Output is ordered by window
    /// start, then actor. `cancel` is checked once per window.
    pub fn extract_cancellable(
        &self,
        entries: &[ParsedLogEntry],
        cancel: &CancelToken,
    ) -> Result<(Vec<FeatureVector>, ExtractReport), PipelineError> {
        let mut report = ExtractReport::default();
        let timed: Vec<&ParsedLogEntry> = entries.iter().filter(|e| e.timestamp.is_some()).collect();
        report.untimed_entries = entries.len() - timed.len();

        let origin = match timed.iter().filter_map(|e| e.timestamp).min() {
            Some(t) => t,
            None => {
                debug!(untimed = report.untimed_entries, "no timestamped entries to window");
                return Ok((Vec::new(), report));
            }
        };
        let width_ms = (self.window_seconds * 1000) as i64;
        let width = Duration::milliseconds(width_ms);

        let mut windows: BTreeMap<(i64, Option<String>), WindowStats<'_>> = BTreeMap::new();
        for entry in timed {
            let Some(ts) = entry.timestamp else { continue };
            let k = (ts - origin).num_milliseconds() / width_ms;
            let actor = if self.group_by_actor { entry.ip_src.clone() } else { None };
            windows
                .entry((k, actor.clone()))
                .or_insert_with(|| {
                    let start = origin + Duration::milliseconds(k * width_ms);
                    WindowStats::new(start, start + width, actor)
                })
                .entries
                .push(entry);
        }

        let occupied: BTreeSet<i64> = windows.keys().map(|(k, _)| *k).collect();
        if let Some(last) = occupied.iter().next_back() {
            report.empty_windows_skipped = (*last as usize + 1) - occupied.len();
        }

        let mut vectors = Vec::with_capacity(windows.len());
        for stats in windows.values() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            vectors.push(stats.to_vector(&self.bindings));
        }
        report.windows_emitted = vectors.len();
        debug!(
            windows = report.windows_emitted,
            empty = report.empty_windows_skipped,
            untimed = report.untimed_entries,
            "extracted feature vectors"
        );
        Ok((vectors, report))
    }
}

/// Extract with default field bindings.
pub fn extract(
    entries: &[ParsedLogEntry],
    window_seconds: u64,
    group_by_actor: bool,
) -> Result<Vec<FeatureVector>, ConfigError> {
    Ok(FeatureExtractor::new(window_seconds, group_by_actor)?.extract(entries).0)
}
