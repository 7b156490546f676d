//! Schema types for the JSON object dump.
//!
//! Schema types are separate from runtime types so the dump format can
//! evolve independently, and so every loaded object is validated on the way
//! back in. All maps are `BTreeMap` for deterministic output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Task, as written in object dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKindSchema {
    Regression,
    BinaryClassification,
    MulticlassClassification,
}

/// Model metadata schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetaSchema {
    pub task: TaskKindSchema,
    pub num_features: usize,
    /// Class count, written for classification tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_names: Option<Vec<String>>,
    /// `[min, max]` per feature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_ranges: Option<Vec<[f64; 2]>>,
}

/// Leaf values schema (one entry per node; internal nodes hold the default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeafValuesSchema {
    /// Scalar leaves (one f64 per node).
    Scalar { values: Vec<f64> },
    /// Vector leaves (class distribution per node).
    Vector { values: Vec<Vec<f64>> },
}

/// Tree schema (SoA layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSchema {
    /// Total node count.
    pub num_nodes: u32,
    pub split_indices: Vec<u32>,
    pub thresholds: Vec<f64>,
    pub children_left: Vec<u32>,
    pub children_right: Vec<u32>,
    /// Default direction (true = left) for each node.
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    pub leaf_values: LeafValuesSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gains: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covers: Option<Vec<f64>>,
}

/// Trees with their groups and base score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestSchema {
    /// Trees in iteration order.
    pub trees: Vec<TreeSchema>,
    pub tree_groups: Vec<u32>,
    /// Number of output groups.
    pub n_groups: u32,
    /// Base score(s).
    pub base_score: Vec<f64>,
}

/// Full GBDT model schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GBDTModelSchema {
    pub meta: ModelMetaSchema,
    pub forest: ForestSchema,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl GBDTModelSchema {
    /// Type name stored in object dumps.
    pub const TYPE_NAME: &'static str = "GradientBoostingClassifier";
}

/// Full random forest model schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModelSchema {
    pub meta: ModelMetaSchema,
    pub forest: ForestSchema,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RandomForestModelSchema {
    /// Type name stored in object dumps.
    pub const TYPE_NAME: &'static str = "RandomForestClassifier";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_serde() {
        let task = TaskKindSchema::MulticlassClassification;
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#""multiclass_classification""#);

        let parsed: TaskKindSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn leaf_values_tagged() {
        let scalar = LeafValuesSchema::Scalar { values: vec![1.0, 2.0, 3.0] };
        let json = serde_json::to_string(&scalar).unwrap();
        assert!(json.contains(r#""type":"scalar""#));

        let vector = LeafValuesSchema::Vector { values: vec![vec![1.0, 2.0], vec![3.0, 4.0]] };
        let json = serde_json::to_string(&vector).unwrap();
        assert!(json.contains(r#""type":"vector""#));
    }

    #[test]
    fn model_meta_optional_fields() {
        let meta = ModelMetaSchema {
            task: TaskKindSchema::Regression,
            num_features: 10,
            num_classes: None,
            feature_names: None,
            class_names: None,
            feature_ranges: None,
        };

        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("num_classes"));
        assert!(!json.contains("feature_names"));
        assert!(!json.contains("feature_ranges"));
    }
}
