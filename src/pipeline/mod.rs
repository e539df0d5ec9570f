//! Pipeline orchestrator: sources → normalize → clean → windowed features →
//! ensemble scoring. Each stage is callable on its own; `run*` composes them
//! and returns every intermediate table with a run report.

use crate::cancel::CancelToken;
use crate::clean::{CleanOutcome, CleanReport, Cleaner};
use crate::collectors::{Collected, CollectorPipeline, RawLine, SourceFailure, SourceSpec};
use crate::config::PipelineConfig;
use crate::ensemble::{EnsembleEngine, EnsembleOutcome, EnsembleResult};
use crate::error::{ConfigError, PipelineError};
use crate::features::{ExtractReport, FeatureExtractor, FeatureVector};
use crate::logging::{Milestone, NoopObserver, PipelineObserver};
use crate::normalize::{NormalizeReport, Normalizer, ParsedLogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A feature vector with its ensemble verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredWindow {
    pub features: FeatureVector,
    pub ensemble: EnsembleResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub lines_read: usize,
    pub source_failures: Vec<SourceFailure>,
    pub normalize: NormalizeReport,
    pub clean: CleanReport,
    pub extract: ExtractReport,
    pub detector_failures: Vec<DetectorFailure>,
    pub windows_scored: usize,
    pub anomalies: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub grouped_by_actor: bool,
    /// Normalizer output, one entry per line read.
    pub raw: Vec<ParsedLogEntry>,
    pub cleaned: Vec<ParsedLogEntry>,
    pub rows: Vec<ScoredWindow>,
    pub report: RunReport,
}

pub struct Pipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    cleaner: Cleaner,
    extractor: FeatureExtractor,
    ensemble: EnsembleEngine,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancelToken,
}

impl Pipeline {
    /// Validate `config` and build every stage. Invalid configuration is the
    /// only fatal error.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let bindings = config.bindings.resolve()?;
        let extractor = FeatureExtractor::new(config.window_seconds, config.group_by_actor)?.with_bindings(bindings);
        Ok(Self {
            normalizer: Normalizer::new(&config.normalizer),
            cleaner: Cleaner::new(&config.normalizer),
            extractor,
            ensemble: EnsembleEngine::new(config.ensemble.clone()),
            observer: Arc::new(NoopObserver),
            cancel: CancelToken::new(),
            config,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn check_cancel(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn ingest(&self, sources: &[SourceSpec]) -> Result<Collected, PipelineError> {
        CollectorPipeline::new(sources.to_vec()).collect(&self.cancel, self.observer.as_ref())
    }

    pub fn parse(&self, lines: &[RawLine]) -> Result<(Vec<ParsedLogEntry>, NormalizeReport), PipelineError> {
        let (entries, report) = self.normalizer.normalize_cancellable(lines, &self.cancel)?;
        self.observer.on_milestone(&Milestone::Normalized(&report));
        Ok((entries, report))
    }

    pub fn clean(&self, entries: Vec<ParsedLogEntry>) -> CleanOutcome {
        let outcome = self.cleaner.clean(entries);
        self.observer.on_milestone(&Milestone::Cleaned(&outcome.report));
        outcome
    }

    pub fn extract(&self, entries: &[ParsedLogEntry]) -> Result<(Vec<FeatureVector>, ExtractReport), PipelineError> {
        let (vectors, report) = self.extractor.extract_cancellable(entries, &self.cancel)?;
        self.observer.on_milestone(&Milestone::Extracted(&report));
        Ok((vectors, report))
    }

    pub fn score(&self, vectors: &[FeatureVector]) -> EnsembleOutcome {
        let outcome = self.ensemble.score(vectors);
        for failure in &outcome.failures {
            self.observer.on_milestone(&Milestone::DetectorFailed(failure));
        }
        self.observer.on_milestone(&Milestone::Scored {
            windows: outcome.results.len(),
            anomalies: outcome.anomalies(),
        });
        outcome
    }

    /// Run over the configured sources.
    pub fn run(&self) -> Result<PipelineRun, PipelineError> {
        self.run_sources(&self.config.sources)
    }

    pub fn run_sources(&self, sources: &[SourceSpec]) -> Result<PipelineRun, PipelineError> {
        let collected = self.ingest(sources)?;
        self.process(collected.lines, collected.failures)
    }

    /// Run over lines already in memory.
    pub fn run_lines(&self, lines: Vec<RawLine>) -> Result<PipelineRun, PipelineError> {
        self.process(lines, Vec::new())
    }

    fn process(&self, lines: Vec<RawLine>, source_failures: Vec<SourceFailure>) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let (raw, normalize) = self.parse(&lines)?;
        self.check_cancel()?;
        let CleanOutcome { entries: cleaned, report: clean } = self.clean(raw.clone());
        self.check_cancel()?;
        let (vectors, extract) = self.extract(&cleaned)?;
        self.check_cancel()?;
        let outcome = self.score(&vectors);

        let report = RunReport {
            lines_read: lines.len(),
            source_failures,
            normalize,
            clean,
            extract,
            detector_failures: outcome
                .failures
                .iter()
                .map(|e| DetectorFailure {
                    model: e.model().to_string(),
                    error: e.to_string(),
                })
                .collect(),
            windows_scored: outcome.results.len(),
            anomalies: outcome.anomalies(),
        };
        let rows = vectors
            .into_iter()
            .zip(outcome.results)
            .map(|(features, ensemble)| ScoredWindow { features, ensemble })
            .collect();

        info!(
            run_id = %run_id,
            lines = report.lines_read,
            windows = report.windows_scored,
            anomalies = report.anomalies,
            "pipeline run complete"
        );
        Ok(PipelineRun {
            run_id,
            grouped_by_actor: self.config.group_by_actor,
            raw,
            cleaned,
            rows,
            report,
        })
    }
}

/// Run the default pipeline over `sources` with the given window width.
pub fn run(sources: &[SourceSpec], window_seconds: u64) -> Result<PipelineRun, PipelineError> {
    let config = PipelineConfig {
        sources: sources.to_vec(),
        window_seconds,
        ..Default::default()
    };
    Pipeline::new(config)?.run()
}
