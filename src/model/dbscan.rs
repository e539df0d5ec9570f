//! DBSCAN density clustering. Transductive: every `predict` re-clusters the
//! rows it is given; points in no cluster are anomalous. The score is the
//! core distance (distance to the `min_samples`-th nearest point, the point
//! itself included).

use super::{check_dims, squared_distance, Detector, DetectorVerdict};
use crate::error::DetectorError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const NAME: &str = "dbscan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanConfig {
    pub eps: f64,
    pub min_samples: usize,
    /// Row cap; clustering holds an `n×n` distance matrix.
    pub max_rows: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 5,
            max_rows: 5_000,
        }
    }
}

pub struct Dbscan {
    config: DbscanConfig,
    n_features: Option<usize>,
}

impl Dbscan {
    pub fn new(config: DbscanConfig) -> Self {
        Self {
            config,
            n_features: None,
        }
    }

    fn require_rows(&self, x: &Array2<f64>) -> Result<(), DetectorError> {
        if x.nrows() < self.config.min_samples {
            return Err(DetectorError::InsufficientSamples {
                model: NAME,
                required: self.config.min_samples,
                found: x.nrows(),
            });
        }
        if x.nrows() > self.config.max_rows {
            return Err(DetectorError::TooManySamples {
                model: NAME,
                limit: self.config.max_rows,
                found: x.nrows(),
            });
        }
        Ok(())
    }

    /// Cluster id per row; `None` is noise.
    pub fn cluster(&self, x: &Array2<f64>) -> Vec<Option<usize>> {
        self.cluster_with_distances(&distances(x)).0
    }

    fn cluster_with_distances(&self, dist: &[Vec<f64>]) -> (Vec<Option<usize>>, Vec<f64>) {
        let n = dist.len();
        let min_samples = self.config.min_samples.max(1);
        let neighbours: Vec<Vec<usize>> = dist
            .iter()
            .map(|row| (0..n).filter(|&j| row[j] <= self.config.eps).collect())
            .collect();
        let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_samples).collect();

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut next_cluster = 0;
        for seed in 0..n {
            if !is_core[seed] || labels[seed].is_some() {
                continue;
            }
            labels[seed] = Some(next_cluster);
            let mut queue: VecDeque<usize> = VecDeque::from([seed]);
            while let Some(p) = queue.pop_front() {
                if !is_core[p] {
                    continue;
                }
                for &q in &neighbours[p] {
                    if labels[q].is_none() {
                        labels[q] = Some(next_cluster);
                        queue.push_back(q);
                    }
                }
            }
            next_cluster += 1;
        }

        let core_distance = dist
            .iter()
            .map(|row| {
                let mut sorted = row.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                sorted[(min_samples - 1).min(n - 1)]
            })
            .collect();
        (labels, core_distance)
    }
}

fn distances(x: &Array2<f64>) -> Vec<Vec<f64>> {
    let n = x.nrows();
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = squared_distance(x.row(i), x.row(j)).sqrt();
            out[i][j] = d;
            out[j][i] = d;
        }
    }
    out
}

impl Detector for Dbscan {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), DetectorError> {
        self.require_rows(x)?;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError> {
        let expected = self.n_features.ok_or(DetectorError::NotFitted { model: NAME })?;
        check_dims(NAME, expected, x)?;
        self.require_rows(x)?;
        let (labels, core_distance) = self.cluster_with_distances(&distances(x));
        Ok(labels
            .into_iter()
            .zip(core_distance)
            .map(|(cluster, score)| DetectorVerdict {
                model: NAME.to_string(),
                label: u8::from(cluster.is_none()),
                score,
            })
            .collect())
    }
}
