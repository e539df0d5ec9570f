//! Combines per-detector labels into one ensemble label per window.

mod engine;

pub use engine::{EnsembleEngine, EnsembleOutcome, EnsembleResult};

use crate::model::{DbscanConfig, IsolationForestConfig, OneClassSvmConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteRule {
    /// More than half of the voting detectors.
    #[default]
    Majority,
    /// Any single voting detector.
    Any,
}

impl VoteRule {
    /// Positive labels needed when `voters` detectors vote.
    pub fn threshold(self, voters: usize) -> usize {
        match self {
            VoteRule::Majority => voters / 2 + 1,
            VoteRule::Any => 1,
        }
    }
}

/// Ensemble label from per-detector labels; `None` entries are detectors
/// that could not vote. No voters gives `None`.
pub fn vote(labels: &[Option<u8>], rule: VoteRule) -> Option<u8> {
    let voters = labels.iter().flatten().count();
    if voters == 0 {
        return None;
    }
    let positive = labels.iter().flatten().filter(|&&l| l == 1).count();
    Some(u8::from(positive >= rule.threshold(voters)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub vote: VoteRule,
    /// Run the detectors on scoped threads.
    pub parallel: bool,
    pub isolation_forest: IsolationForestConfig,
    pub one_class_svm: OneClassSvmConfig,
    pub dbscan: DbscanConfig,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            vote: VoteRule::Majority,
            parallel: true,
            isolation_forest: IsolationForestConfig::default(),
            one_class_svm: OneClassSvmConfig::default(),
            dbscan: DbscanConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_thresholds() {
        assert_eq!(vote(&[Some(1), Some(1), Some(0)], VoteRule::Majority), Some(1));
        assert_eq!(vote(&[Some(1), Some(0), Some(0)], VoteRule::Majority), Some(0));
        assert_eq!(vote(&[Some(1), None, Some(0)], VoteRule::Majority), Some(0));
        assert_eq!(vote(&[Some(1), None, Some(1)], VoteRule::Majority), Some(1));
        assert_eq!(vote(&[None, Some(1), None], VoteRule::Majority), Some(1));
        assert_eq!(vote(&[None, None, None], VoteRule::Majority), None);
    }

    #[test]
    fn any_rule() {
        assert_eq!(vote(&[Some(0), Some(0), Some(1)], VoteRule::Any), Some(1));
        assert_eq!(vote(&[Some(0), Some(0), Some(0)], VoteRule::Any), Some(0));
    }
}
