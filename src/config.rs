//! Pipeline configuration, read from a JSON file. Every section has defaults,
//! so a partial file (or none at all) is valid.

use crate::collectors::SourceSpec;
use crate::ensemble::EnsembleConfig;
use crate::error::ConfigError;
use crate::normalize::NormalizerConfig;
use crate::schema::FieldBindings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Line sources, read in order
    pub sources: Vec<SourceSpec>,
    /// Tumbling window width in seconds
    pub window_seconds: u64,
    /// Key windows by source IP as well as time
    pub group_by_actor: bool,
    /// Which entry fields feed the host and process features
    pub bindings: FieldBindings,
    pub normalizer: NormalizerConfig,
    pub ensemble: EnsembleConfig,
    pub output: OutputConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File stem for `<basename>.csv` / `<basename>.json`
    pub basename: String,
    pub csv: bool,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            window_seconds: 60,
            group_by_actor: false,
            bindings: FieldBindings::default(),
            normalizer: NormalizerConfig::default(),
            ensemble: EnsembleConfig::default(),
            output: OutputConfig::default(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            basename: "window_scores".to_string(),
            csv: true,
            json: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("output/window_scores.db"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file if present; otherwise return the defaults. A file
    /// that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that must hold before any input is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::InvalidWindow(self.window_seconds));
        }
        let iforest = &self.ensemble.isolation_forest;
        if !(iforest.contamination > 0.0 && iforest.contamination <= 0.5) {
            return Err(invalid(
                "isolation_forest.contamination",
                format!("must be in (0, 0.5], got {}", iforest.contamination),
            ));
        }
        if iforest.n_trees == 0 {
            return Err(invalid("isolation_forest.n_trees", "must be at least 1".to_string()));
        }
        if iforest.max_samples < 2 {
            return Err(invalid("isolation_forest.max_samples", "must be at least 2".to_string()));
        }
        let svm = &self.ensemble.one_class_svm;
        if !(svm.nu > 0.0 && svm.nu <= 1.0) {
            return Err(invalid("one_class_svm.nu", format!("must be in (0, 1], got {}", svm.nu)));
        }
        if let Some(gamma) = svm.gamma {
            if !(gamma > 0.0 && gamma.is_finite()) {
                return Err(invalid("one_class_svm.gamma", format!("must be positive, got {}", gamma)));
            }
        }
        if !(svm.tol > 0.0) {
            return Err(invalid("one_class_svm.tol", format!("must be positive, got {}", svm.tol)));
        }
        if svm.max_rows < 2 {
            return Err(invalid("one_class_svm.max_rows", format!("must be at least 2, got {}", svm.max_rows)));
        }
        let dbscan = &self.ensemble.dbscan;
        if !(dbscan.eps > 0.0 && dbscan.eps.is_finite()) {
            return Err(invalid("dbscan.eps", format!("must be positive, got {}", dbscan.eps)));
        }
        if dbscan.min_samples == 0 {
            return Err(invalid("dbscan.min_samples", "must be at least 1".to_string()));
        }
        if dbscan.max_rows < dbscan.min_samples {
            return Err(invalid(
                "dbscan.max_rows",
                format!("must be at least min_samples ({}), got {}", dbscan.min_samples, dbscan.max_rows),
            ));
        }
        self.bindings.resolve()?;
        Ok(())
    }
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidParameter { name, reason }
}
