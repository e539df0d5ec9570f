//! One-class SVM with an RBF kernel, trained by SMO on the ν-formulation
//! (`0 ≤ αᵢ ≤ 1`, `Σ αᵢ = ν·n`). Decision `f(x) = Σ αᵢ K(xᵢ, x) − ρ`;
//! negative decisions are anomalous.

use super::{check_dims, remap_native, squared_distance, Detector, DetectorVerdict};
use crate::error::DetectorError;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

const NAME: &str = "one_class_svm";
const UPPER: f64 = 1.0;
const MIN_CURVATURE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneClassSvmConfig {
    pub nu: f64,
    /// RBF width; `1 / (d · Var(X))` when unset.
    pub gamma: Option<f64>,
    pub tol: f64,
    /// Iteration cap; `max(10000, 100·n)` when unset.
    pub max_iter: Option<usize>,
    /// Row cap; training holds an `n×n` kernel matrix.
    pub max_rows: usize,
}

impl Default for OneClassSvmConfig {
    fn default() -> Self {
        Self {
            nu: 0.1,
            gamma: None,
            tol: 1e-3,
            max_iter: None,
            max_rows: 5_000,
        }
    }
}

struct Fitted {
    support: Array2<f64>,
    alpha: Vec<f64>,
    rho: f64,
    gamma: f64,
}

pub struct OneClassSvm {
    config: OneClassSvmConfig,
    fitted: Option<Fitted>,
}

impl OneClassSvm {
    pub fn new(config: OneClassSvmConfig) -> Self {
        Self { config, fitted: None }
    }

    /// `f(x)` for every row.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Vec<f64>, DetectorError> {
        let fitted = self.fitted.as_ref().ok_or(DetectorError::NotFitted { model: NAME })?;
        check_dims(NAME, fitted.support.ncols(), x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                fitted
                    .support
                    .rows()
                    .into_iter()
                    .zip(&fitted.alpha)
                    .map(|(sv, a)| a * rbf(sv, row, fitted.gamma))
                    .sum::<f64>()
                    - fitted.rho
            })
            .collect())
    }
}

fn rbf(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, gamma: f64) -> f64 {
    (-gamma * squared_distance(a, b)).exp()
}

/// `1 / (d · Var(X))` over all elements, 1 for constant input.
fn default_gamma(x: &Array2<f64>) -> f64 {
    let n = x.len() as f64;
    let mean = x.sum() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if var > 0.0 && var.is_finite() {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl Detector for OneClassSvm {
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
        if n > self.config.max_rows {
            return Err(DetectorError::TooManySamples {
                model: NAME,
                limit: self.config.max_rows,
                found: n,
            });
        }
        if x.ncols() == 0 {
            return Err(DetectorError::Degenerate {
                model: NAME,
                reason: "no features".to_string(),
            });
        }
        let gamma = self.config.gamma.unwrap_or_else(|| default_gamma(x));
        let max_iter = self.config.max_iter.unwrap_or_else(|| (100 * n).max(10_000));

        let mut kernel = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let k = rbf(x.row(i), x.row(j), gamma);
                kernel[[i, j]] = k;
                kernel[[j, i]] = k;
            }
        }

        // Feasible start: the first ⌊ν·n⌋ multipliers at the bound, the
        // remainder on the next one.
        let total = self.config.nu * n as f64;
        let mut alpha = vec![0.0; n];
        let full = (total.floor() as usize).min(n);
        for a in alpha.iter_mut().take(full) {
            *a = UPPER;
        }
        if full < n {
            alpha[full] = total - full as f64;
        }

        let mut grad: Vec<f64> = (0..n)
            .map(|i| (0..n).map(|j| kernel[[i, j]] * alpha[j]).sum())
            .collect();

        let mut iterations = 0;
        while iterations < max_iter {
            let up = (0..n)
                .filter(|&t| alpha[t] < UPPER)
                .min_by(|&a, &b| grad[a].total_cmp(&grad[b]));
            let low = (0..n)
                .filter(|&t| alpha[t] > 0.0)
                .max_by(|&a, &b| grad[a].total_cmp(&grad[b]));
            let (i, j) = match (up, low) {
                (Some(i), Some(j)) => (i, j),
                _ => break,
            };
            if grad[j] - grad[i] < self.config.tol {
                break;
            }
            let curvature = (kernel[[i, i]] + kernel[[j, j]] - 2.0 * kernel[[i, j]]).max(MIN_CURVATURE);
            let step = ((grad[j] - grad[i]) / curvature).min(UPPER - alpha[i]).min(alpha[j]);
            alpha[i] += step;
            alpha[j] -= step;
            for (t, g) in grad.iter_mut().enumerate() {
                *g += step * (kernel[[t, i]] - kernel[[t, j]]);
            }
            iterations += 1;
        }

        let rho = offset(&alpha, &grad);
        debug!(iterations, rho, gamma, "one-class svm converged");

        let support_idx: Vec<usize> = (0..n).filter(|&i| alpha[i] > 0.0).collect();
        let mut support = Array2::<f64>::zeros((support_idx.len(), x.ncols()));
        for (row, &i) in support_idx.iter().enumerate() {
            support.row_mut(row).assign(&x.row(i));
        }
        self.fitted = Some(Fitted {
            support,
            alpha: support_idx.iter().map(|&i| alpha[i]).collect(),
            rho,
            gamma,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|f| DetectorVerdict {
                model: NAME.to_string(),
                label: remap_native(if f < 0.0 { -1 } else { 1 }),
                score: -f,
            })
            .collect())
    }
}

/// ρ: mean gradient over free multipliers, else the midpoint of the bounds.
fn offset(alpha: &[f64], grad: &[f64]) -> f64 {
    let mut free_sum = 0.0;
    let mut free = 0usize;
    let mut lower = f64::NEG_INFINITY;
    let mut upper = f64::INFINITY;
    for (&a, &g) in alpha.iter().zip(grad) {
        if a >= UPPER {
            lower = lower.max(g);
        } else if a <= 0.0 {
            upper = upper.min(g);
        } else {
            free += 1;
            free_sum += g;
        }
    }
    if free > 0 {
        free_sum / free as f64
    } else if lower.is_finite() && upper.is_finite() {
        (lower + upper) / 2.0
    } else if lower.is_finite() {
        lower
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_point_has_negative_decision() {
        let mut rows = Vec::new();
        for i in 0..30 {
            let v = (i % 6) as f64 * 0.05;
            rows.extend([v, v * 0.5]);
        }
        rows.extend([6.0, -6.0]);
        let x = Array2::from_shape_vec((31, 2), rows).unwrap();
        let mut svm = OneClassSvm::new(OneClassSvmConfig::default());
        let verdicts = svm.fit_predict(&x).unwrap();
        assert_eq!(verdicts[30].label, 1);
        assert!(verdicts[30].score > 0.0);
        let flagged = verdicts.iter().filter(|v| v.label == 1).count();
        assert!(flagged < 31);
    }

    #[test]
    fn multipliers_sum_to_nu_n() {
        let x = Array2::from_shape_vec((10, 1), (0..10).map(|v| v as f64).collect()).unwrap();
        let mut svm = OneClassSvm::new(OneClassSvmConfig {
            nu: 0.3,
            ..Default::default()
        });
        svm.fit(&x).unwrap();
        let sum: f64 = svm.fitted.as_ref().unwrap().alpha.iter().sum();
        assert!((sum - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_single_row() {
        let mut svm = OneClassSvm::new(OneClassSvmConfig::default());
        assert!(matches!(
            svm.fit(&Array2::zeros((1, 2))),
            Err(DetectorError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn rejects_rows_over_cap() {
        let mut svm = OneClassSvm::new(OneClassSvmConfig {
            max_rows: 10,
            ..Default::default()
        });
        let x = Array2::from_shape_vec((11, 1), (0..11).map(|v| v as f64).collect()).unwrap();
        assert_eq!(
            svm.fit(&x),
            Err(DetectorError::TooManySamples {
                model: "one_class_svm",
                limit: 10,
                found: 11
            })
        );
        assert!(svm.fitted.is_none());
    }
}
