//! Evaluation sets for per-round metric logging.

use ndarray::{ArrayView1, ArrayView2};

/// A named labelled dataset evaluated after every boosting round.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub name: &'a str,
    /// Feature matrix, `[n_samples, n_features]`.
    pub features: ArrayView2<'a, f32>,
    pub labels: ArrayView1<'a, u32>,
}

impl<'a> EvalSet<'a> {
    pub fn new(name: &'a str, features: ArrayView2<'a, f32>, labels: ArrayView1<'a, u32>) -> Self {
        Self { name, features, labels }
    }
}

/// One metric value reported for one eval set.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    pub set: String,
    pub metric: &'static str,
    pub value: f64,
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}'s {}: {:.6}", self.set, self.metric, self.value)
    }
}
