//! Persistence sink for scored windows.

mod sqlite;

pub use sqlite::SqliteSink;

use crate::config::StoreConfig;
use crate::error::SinkError;
use crate::pipeline::ScoredWindow;
use tracing::warn;

pub trait FeatureSink: Send + Sync {
    /// Insert one scored window. Re-inserting the same window replaces it.
    fn insert(&self, run_id: &str, row: &ScoredWindow) -> Result<(), SinkError>;
}

/// Discards everything.
pub struct NullSink;

impl FeatureSink for NullSink {
    fn insert(&self, _run_id: &str, _row: &ScoredWindow) -> Result<(), SinkError> {
        Ok(())
    }
}

/// SQLite sink when enabled and openable, otherwise a [`NullSink`].
pub fn open_sink(config: &StoreConfig) -> Box<dyn FeatureSink> {
    if !config.enabled {
        return Box::new(NullSink);
    }
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "cannot create store directory, persistence disabled");
            return Box::new(NullSink);
        }
    }
    match SqliteSink::open(&config.path) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!(path = %config.path.display(), error = %e, "cannot open store, persistence disabled");
            Box::new(NullSink)
        }
    }
}
