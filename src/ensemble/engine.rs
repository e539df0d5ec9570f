//! Fits every detector on the standardized matrix and votes per window.

use super::{vote, EnsembleConfig, VoteRule};
use crate::error::DetectorError;
use crate::features::FeatureVector;
use crate::model::{Dbscan, Detector, DetectorVerdict, FeatureMatrix, IsolationForest, OneClassSvm};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ensemble result for a single window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub actor_ip: Option<String>,
    /// `None` only when no detector could vote.
    pub ensemble_anomaly: Option<u8>,
    pub voters: usize,
    /// One entry per detector that voted, in detector order.
    pub verdicts: Vec<DetectorVerdict>,
}

impl EnsembleResult {
    pub fn verdict(&self, model: &str) -> Option<&DetectorVerdict> {
        self.verdicts.iter().find(|v| v.model == model)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnsembleOutcome {
    pub results: Vec<EnsembleResult>,
    pub failures: Vec<DetectorError>,
}

impl EnsembleOutcome {
    pub fn anomalies(&self) -> usize {
        self.results.iter().filter(|r| r.ensemble_anomaly == Some(1)).count()
    }
}

pub struct EnsembleEngine {
    config: EnsembleConfig,
}

impl EnsembleEngine {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn vote_rule(&self) -> VoteRule {
        self.config.vote
    }

    /// Detector names in voting order.
    pub fn detector_names() -> [&'static str; 3] {
        ["isolation_forest", "one_class_svm", "dbscan"]
    }

    fn detectors(&self) -> Vec<Box<dyn Detector>> {
        vec![
            Box::new(IsolationForest::new(self.config.isolation_forest.clone())),
            Box::new(OneClassSvm::new(self.config.one_class_svm.clone())),
            Box::new(Dbscan::new(self.config.dbscan.clone())),
        ]
    }

    pub fn score(&self, vectors: &[FeatureVector]) -> EnsembleOutcome {
        if vectors.is_empty() {
            return EnsembleOutcome::default();
        }
        let x = FeatureMatrix::from_vectors(vectors).standardized();
        let runs = if self.config.parallel {
            run_parallel(self.detectors(), &x)
        } else {
            self.detectors().into_iter().map(|d| run_one(d, &x)).collect()
        };

        let mut failures = Vec::new();
        let mut columns: Vec<Vec<DetectorVerdict>> = Vec::new();
        for run in runs {
            match run {
                Ok(verdicts) => columns.push(verdicts),
                Err(e) => {
                    warn!(model = e.model(), error = %e, "detector excluded from vote");
                    failures.push(e);
                }
            }
        }

        let results: Vec<EnsembleResult> = vectors
            .iter()
            .enumerate()
            .map(|(row, fv)| {
                let verdicts: Vec<DetectorVerdict> = columns.iter().map(|c| c[row].clone()).collect();
                let labels: Vec<Option<u8>> = verdicts.iter().map(|v| Some(v.label)).collect();
                EnsembleResult {
                    window_start: fv.window_start,
                    window_end: fv.window_end,
                    actor_ip: fv.actor_ip.clone(),
                    ensemble_anomaly: vote(&labels, self.config.vote),
                    voters: verdicts.len(),
                    verdicts,
                }
            })
            .collect();

        let outcome = EnsembleOutcome { results, failures };
        debug!(
            windows = outcome.results.len(),
            anomalies = outcome.anomalies(),
            failed = outcome.failures.len(),
            "ensemble scored"
        );
        outcome
    }
}

fn run_one(mut detector: Box<dyn Detector>, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError> {
    detector.fit_predict(x)
}

/// One scoped thread per detector over the shared matrix; results keep
/// detector order.
fn run_parallel(
    detectors: Vec<Box<dyn Detector>>,
    x: &Array2<f64>,
) -> Vec<Result<Vec<DetectorVerdict>, DetectorError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = detectors
            .into_iter()
            .map(|d| {
                let name = d.name();
                (name, scope.spawn(move || run_one(d, x)))
            })
            .collect();
        handles
            .into_iter()
            .map(|(name, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(DetectorError::Degenerate {
                        model: name,
                        reason: "detector thread panicked".to_string(),
                    })
                })
            })
            .collect()
    })
}
