//! Unsupervised anomaly detectors over the standardized numeric projection of
//! the feature vectors. Every detector reports 1 for anomalous, 0 for normal,
//! and a score where higher means more anomalous.

mod dbscan;
mod isolation;
mod ocsvm;

pub use dbscan::{Dbscan, DbscanConfig};
pub use isolation::{IsolationForest, IsolationForestConfig};
pub use ocsvm::{OneClassSvm, OneClassSvmConfig};

use crate::error::DetectorError;
use crate::features::FeatureVector;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorVerdict {
    pub model: String,
    pub label: u8,
    pub score: f64,
}

pub trait Detector: Send {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Array2<f64>) -> Result<(), DetectorError>;

    /// One verdict per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError>;

    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<DetectorVerdict>, DetectorError> {
        self.fit(x)?;
        self.predict(x)
    }
}

/// Map the native inlier/outlier convention (+1 / −1) to 0 / 1.
pub fn remap_native(native: i8) -> u8 {
    if native < 0 {
        1
    } else {
        0
    }
}

/// Numeric projection of a batch of feature vectors, one row per window.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    columns: Vec<&'static str>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Non-finite values become 0.
    pub fn from_vectors(vectors: &[FeatureVector]) -> Self {
        let columns = FeatureVector::numeric_columns();
        let mut values = Array2::<f64>::zeros((vectors.len(), columns.len()));
        for (mut row, fv) in values.axis_iter_mut(Axis(0)).zip(vectors) {
            for (cell, (_, v)) in row.iter_mut().zip(fv.numeric_features()) {
                *cell = if v.is_finite() { v } else { 0.0 };
            }
        }
        Self { columns, values }
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn raw(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Z-score each column with the population standard deviation. Constant
    /// columns become 0.
    pub fn standardized(&self) -> Array2<f64> {
        let mut out = self.values.clone();
        for mut col in out.axis_iter_mut(Axis(1)) {
            let n = col.len() as f64;
            if n == 0.0 {
                continue;
            }
            let mean = col.sum() / n;
            let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            if std > 0.0 && std.is_finite() {
                col.mapv_inplace(|v| (v - mean) / std);
            } else {
                col.fill(0.0);
            }
        }
        out
    }
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Linear-interpolation quantile, `q` in `[0, 1]`.
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub(crate) fn check_dims(model: &'static str, expected: usize, x: &Array2<f64>) -> Result<(), DetectorError> {
    if x.ncols() != expected {
        return Err(DetectorError::DimensionMismatch {
            model,
            expected,
            found: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn quantile_interpolates() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 1.0), 4.0);
        assert_eq!(quantile(&[7.0], 0.9), 7.0);
    }

    #[test]
    fn remap() {
        assert_eq!(remap_native(-1), 1);
        assert_eq!(remap_native(1), 0);
    }

    #[test]
    fn constant_columns_standardize_to_zero() {
        let m = FeatureMatrix {
            columns: vec!["a", "b"],
            values: array![[1.0, 5.0], [3.0, 5.0]],
        };
        let z = m.standardized();
        assert_eq!(z.column(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(z.column(0).to_vec(), vec![-1.0, 1.0]);
    }
}
