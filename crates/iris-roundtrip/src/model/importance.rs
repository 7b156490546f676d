//! Split-count and gain feature importance for tree ensembles.

use thiserror::Error;

use crate::repr::{Forest, LeafValue, TreeView};

/// Importance aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceType {
    /// Number of splits using the feature.
    Split,
    /// Total gain of splits using the feature.
    Gain,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExplainError {
    /// Gain importance needs per-node gains, which some formats do not keep.
    #[error("tree {tree_idx} has no node statistics")]
    MissingNodeStats { tree_idx: usize },
}

/// Per-feature importance values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    values: Vec<f64>,
    names: Option<Vec<String>>,
}

impl FeatureImportance {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Values scaled to sum to 1 (all zeros stay zero).
    pub fn normalized(&self) -> Vec<f64> {
        let total: f64 = self.values.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.values.len()];
        }
        self.values.iter().map(|v| v / total).collect()
    }

    /// The `k` most important feature indices with their values, descending.
    /// Ties keep feature order.
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.values.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }
}

/// Aggregate importance over every split node of `forest`.
pub fn compute_forest_importance<L: LeafValue>(
    forest: &Forest<L>,
    n_features: usize,
    importance_type: ImportanceType,
    names: Option<Vec<String>>,
) -> Result<FeatureImportance, ExplainError> {
    let mut values = vec![0.0f64; n_features];
    for (tree_idx, tree) in forest.trees().enumerate() {
        let gains = match importance_type {
            ImportanceType::Split => None,
            ImportanceType::Gain => {
                Some(tree.gains().ok_or(ExplainError::MissingNodeStats { tree_idx })?)
            }
        };
        for node in 0..tree.n_nodes() as u32 {
            if tree.is_leaf(node) {
                continue;
            }
            let feature = tree.split_index(node) as usize;
            if feature >= n_features {
                continue;
            }
            values[feature] += match gains {
                Some(g) => g[node as usize] as f64,
                None => 1.0,
            };
        }
    }
    Ok(FeatureImportance { values, names })
}
