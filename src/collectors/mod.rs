//! Line sources: single files, folders of files, and a bounded UDP listener.
//! Every source yields [`RawLine`]s in source order; a failing source is
//! reported and skipped, never fatal to the run.

mod file;
mod network;

use crate::cancel::CancelToken;
use crate::error::{PipelineError, SourceError};
use crate::logging::{Milestone, PipelineObserver};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use file::{FileSource, FolderSource};
pub use network::UdpSource;

/// One line of raw text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    pub text: String,
    pub source_id: String,
    /// 1-based physical line in a file, or datagram sequence for UDP.
    pub line_number: u64,
}

impl RawLine {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, line_number: u64) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            line_number,
        }
    }
}

/// Where to read lines from, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    File {
        path: PathBuf,
    },
    Folder {
        path: PathBuf,
        #[serde(default)]
        recursive: bool,
    },
    Udp {
        bind: String,
        #[serde(default = "default_max_records")]
        max_records: usize,
        #[serde(default)]
        idle_timeout_secs: Option<u64>,
    },
}

fn default_max_records() -> usize {
    1000
}

impl SourceSpec {
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::File { path } | SourceSpec::Folder { path, .. } => path.display().to_string(),
            SourceSpec::Udp { bind, .. } => format!("udp://{}", bind),
        }
    }

    /// Open the source. UDP binds here; files are opened lazily on read.
    pub fn open(&self) -> Result<Box<dyn LineSource>, SourceError> {
        Ok(match self {
            SourceSpec::File { path } => Box::new(FileSource::new(path.clone())),
            SourceSpec::Folder { path, recursive } => Box::new(FolderSource::new(path.clone(), *recursive)),
            SourceSpec::Udp {
                bind,
                max_records,
                idle_timeout_secs,
            } => Box::new(UdpSource::bind(
                bind,
                *max_records,
                idle_timeout_secs.map(Duration::from_secs),
            )?),
        })
    }
}

pub trait LineSource {
    fn id(&self) -> String;

    /// Append lines to `out`. Lines pushed before an error stay in `out`.
    fn read_into(&mut self, out: &mut Vec<RawLine>, cancel: &CancelToken) -> Result<(), SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Collected {
    pub lines: Vec<RawLine>,
    pub failures: Vec<SourceFailure>,
}

/// Reads every configured source in order and concatenates their lines.
pub struct CollectorPipeline {
    sources: Vec<SourceSpec>,
}

impl CollectorPipeline {
    pub fn new(sources: Vec<SourceSpec>) -> Self {
        Self { sources }
    }

    pub fn collect(&self, cancel: &CancelToken, observer: &dyn PipelineObserver) -> Result<Collected, PipelineError> {
        let mut out = Collected::default();
        for spec in &self.sources {
            let before = out.lines.len();
            let result = spec
                .open()
                .and_then(|mut source| source.read_into(&mut out.lines, cancel));
            match result {
                Ok(()) => {}
                Err(SourceError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    let source = spec.describe();
                    observer.on_milestone(&Milestone::SourceUnavailable {
                        source: &source,
                        error: &e,
                    });
                    out.failures.push(SourceFailure {
                        source,
                        error: e.to_string(),
                    });
                }
            }
            observer.on_milestone(&Milestone::SourceRead {
                source: &spec.describe(),
                lines: out.lines.len() - before,
            });
        }
        Ok(out)
    }
}

/// Push the non-blank lines of `text`, numbering physical lines from 1.
fn push_lines(
    text: &str,
    source_id: &str,
    out: &mut Vec<RawLine>,
    cancel: &CancelToken,
) -> Result<usize, SourceError> {
    let mut pushed = 0;
    for (i, line) in text.lines().enumerate() {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push(RawLine::new(line, source_id, i as u64 + 1));
        pushed += 1;
    }
    Ok(pushed)
}
