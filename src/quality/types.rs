use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A post-hoc scoring of a succeeded task's output, attached as a
/// `TaskUpdate` with `kind=quality`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub dimension_set: &'static str,
    pub metrics: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub recommendations: Vec<String>,
}

impl QualityAssessment {
    pub fn new(dimension_set: &'static str, metrics: Vec<(&'static str, f64)>, recommendations: Vec<String>) -> Self {
        let overall_score = if metrics.is_empty() {
            0.0
        } else {
            metrics.iter().map(|(_, v)| v).sum::<f64>() / metrics.len() as f64
        };
        QualityAssessment {
            dimension_set,
            metrics: metrics.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            overall_score,
            recommendations,
        }
    }
}
