//! Log triage: security log normalization, windowed behavioural features and
//! ensemble anomaly scoring.
//!
//! Modular structure:
//! - [`collectors`]: File, folder and UDP line sources
//! - [`normalize`]: Format detection and field extraction into [`ParsedLogEntry`]
//! - [`clean`]: Canonicalization, validation and deduplication
//! - [`features`]: Tumbling-window feature extraction
//! - [`model`]: Isolation forest, one-class SVM and DBSCAN detectors
//! - [`ensemble`]: Per-window voting across detectors
//! - [`pipeline`]: Stage orchestration and run reports
//! - [`export`]: CSV / JSON output
//! - [`storage`]: SQLite persistence of scored windows
//! - [`logging`]: Structured logging and milestones

pub mod cancel;
pub mod clean;
pub mod collectors;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod export;
pub mod features;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod storage;

pub use cancel::CancelToken;
pub use collectors::{RawLine, SourceSpec};
pub use config::PipelineConfig;
pub use ensemble::{EnsembleEngine, EnsembleResult};
pub use error::{ConfigError, PipelineError};
pub use features::{FeatureExtractor, FeatureVector};
pub use logging::StructuredLogger;
pub use normalize::{Level, LogFormat, ParsedLogEntry};
pub use pipeline::{Pipeline, PipelineRun, ScoredWindow};
pub use storage::{FeatureSink, SqliteSink};
