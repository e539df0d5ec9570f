//! Isolation forest: random axis-aligned splits isolate outliers in fewer
//! steps. Anomaly score `2^(-E[h(x)] / c(ψ))`; the decision threshold is the
//! `(1 - contamination)` quantile of the training scores.

use super::{check_dims, quantile, remap_native, Detector, DetectorVerdict};
use crate::error::DetectorError;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const NAME: &str = "isolation_forest";
const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct Fitted {
    trees: Vec<Node>,
    subsample: usize,
    threshold: f64,
    n_features: usize,
}

pub struct IsolationForest {
    config: IsolationForestConfig,
    fitted: Option<Fitted>,
}

impl IsolationForest {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config, fitted: None }
    }

    /// Anomaly score of every row, in `(0, 1]`.
    pub fn score_samples(&self, x: &Array2<f64>) -> Result<Vec<f64>, DetectorError> {
        let fitted = self.fitted.as_ref().ok_or(DetectorError::NotFitted { model: NAME })?;
        check_dims(NAME, fitted.n_features, x)?;
        Ok(score_rows(&fitted.trees, fitted.subsample, x))
    }
}

impl Detector for IsolationForest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), DetectorError> {
        let n = x.nrows();
        if n < 2 {
            return Err(DetectorError::InsufficientSamples {
                model: NAME,
                required: 2,
                found: n,
            });
        }
        let subsample = self.config.max_samples.clamp(2, n);
        let height_limit = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let trees: Vec<Node> = (0..self.config.n_trees.max(1))
            .map(|_| {
                let rows = index::sample(&mut rng, n, subsample).into_vec();
                grow(x, rows, 0, height_limit, &mut rng)
            })
            .collect();

        let train_scores = score_rows(&trees, subsample, x);
        let threshold = quantile(&train_scores, 1.0 - self.config.contamination);
        self.fitted = Some(Fitted {
            trees,
            subsample,
            threshold,
            n_features: x.ncols(),
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError> {
        let scores = self.score_samples(x)?;
        let threshold = self.fitted.as_ref().map_or(f64::INFINITY, |f| f.threshold);
        Ok(scores
            .into_iter()
            .map(|score| {
                let native = if score > threshold { -1 } else { 1 };
                DetectorVerdict {
                    model: NAME.to_string(),
                    label: remap_native(native),
                    score,
                }
            })
            .collect())
    }
}

fn grow(x: &Array2<f64>, rows: Vec<usize>, depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }
    let splittable: Vec<(usize, f64, f64)> = (0..x.ncols())
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = x[[r, f]];
                (lo.min(v), hi.max(v))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }
    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| x[[r, feature]] < threshold);
    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(x, left, depth + 1, limit, rng)),
        right: Box::new(grow(x, right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, row: ArrayView1<'_, f64>, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn score_rows(trees: &[Node], subsample: usize, x: &Array2<f64>) -> Vec<f64> {
    let norm = average_path(subsample);
    x.rows()
        .into_iter()
        .map(|row| {
            let mean_depth = trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>() / trees.len() as f64;
            2f64.powf(-mean_depth / norm)
        })
        .collect()
}
