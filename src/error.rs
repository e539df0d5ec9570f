//! Error taxonomy. Only configuration errors are fatal; everything else is
//! recorded in the run report and processing continues.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration; raised immediately.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window size must be a positive number of seconds, got {0}")]
    InvalidWindow(u64),
    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("unknown field `{0}` in field bindings")]
    UnknownField(String),
    #[error("field `{field}` cannot be bound to the `{role}` role (not a text field)")]
    NonTextBinding { role: &'static str, field: String },
    #[error("no field bound to the `{0}` role")]
    EmptyBinding(&'static str),
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A line source that could not be read (fully or partially).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read {source_id}: {source}")]
    Io {
        source_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot bind UDP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("receive failed on {addr} after {received} datagrams: {source}")]
    Receive {
        addr: String,
        received: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("cancelled")]
    Cancelled,
}

/// A detector could not be fitted or applied to the given matrix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("{model}: needs at least {required} samples, got {found}")]
    InsufficientSamples {
        model: &'static str,
        required: usize,
        found: usize,
    },
    #[error("{model}: at most {limit} samples supported, got {found}")]
    TooManySamples {
        model: &'static str,
        limit: usize,
        found: usize,
    },
    #[error("{model}: degenerate input ({reason})")]
    Degenerate { model: &'static str, reason: String },
    #[error("{model}: predict called before fit")]
    NotFitted { model: &'static str },
    #[error("{model}: expected {expected} features, got {found}")]
    DimensionMismatch {
        model: &'static str,
        expected: usize,
        found: usize,
    },
}

impl DetectorError {
    pub fn model(&self) -> &'static str {
        match self {
            DetectorError::InsufficientSamples { model, .. }
            | DetectorError::TooManySamples { model, .. }
            | DetectorError::Degenerate { model, .. }
            | DetectorError::NotFitted { model }
            | DetectorError::DimensionMismatch { model, .. } => model,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pipeline cancelled")]
    Cancelled,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
