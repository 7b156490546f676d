//! Payload structures for the native binary format.
//!
//! These structs are designed for serialization with Postcard. They mirror
//! the runtime types but stay independent of them, so the runtime
//! representation can change without breaking stored files.

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Payload of a native file, tagged by layout version.
///
/// A layout change adds a variant; `V1` stays decodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Version 1 payload format.
    V1(PayloadV1),
}

/// First payload layout: metadata plus forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    /// Model metadata.
    pub metadata: ModelMetadata,
    /// Tree ensemble.
    pub forest: ForestPayload,
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    Regression,
    BinaryClassification,
    MulticlassClassification { n_classes: u32 },
}

/// Model metadata as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Number of input features.
    pub num_features: u32,
    pub task: TaskPayload,
    pub feature_names: Option<Vec<String>>,
    pub class_names: Option<Vec<String>>,
    /// Per-feature `(min, max)` seen during training.
    pub feature_ranges: Option<Vec<(f32, f32)>>,
    /// Training hyperparameters, sorted by key.
    pub attributes: Vec<(String, String)>,
}

// ============================================================================
// Forest
// ============================================================================

/// Forest of decision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPayload {
    /// Number of output groups.
    pub num_groups: u32,
    /// Initial score per group.
    pub base_scores: Vec<f32>,
    /// Output group of each tree.
    pub tree_groups: Vec<u32>,
    /// Values stored per leaf (1 for boosted trees, `n_classes` for forests).
    pub leaf_width: u32,
    pub trees: Vec<TreePayload>,
}

/// One tree, as parallel per-node arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    /// Number of nodes.
    pub num_nodes: u32,
    /// Split feature per node.
    pub split_features: Vec<u32>,
    /// Split thresholds (one per node, 0.0 for leaves).
    pub thresholds: Vec<f32>,
    /// Left child per node (0 at leaves).
    pub left_children: Vec<u32>,
    /// Right child per node (0 at leaves).
    pub right_children: Vec<u32>,
    /// NaN goes left when set.
    pub default_left: Vec<bool>,
    /// Leaf flag per node.
    pub is_leaf: Vec<bool>,
    /// Leaf values, `leaf_width` per leaf, in node order. Internal nodes
    /// store nothing.
    pub leaf_values: Vec<f32>,
    /// Split gains, when the model kept them.
    pub gains: Option<Vec<f32>>,
    /// Optional: cover at each node (for explainability).
    pub covers: Option<Vec<f32>>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Payload {
        Payload::V1(PayloadV1 {
            metadata: ModelMetadata {
                num_features: 4,
                task: TaskPayload::MulticlassClassification { n_classes: 3 },
                feature_names: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
                class_names: None,
                feature_ranges: None,
                attributes: vec![("seed".into(), "42".into())],
            },
            forest: ForestPayload {
                num_groups: 3,
                base_scores: vec![0.0, 0.1, -0.1],
                tree_groups: vec![0],
                leaf_width: 1,
                trees: vec![TreePayload {
                    num_nodes: 1,
                    split_features: vec![0],
                    thresholds: vec![0.0],
                    left_children: vec![0],
                    right_children: vec![0],
                    default_left: vec![false],
                    is_leaf: vec![true],
                    leaf_values: vec![0.25],
                    gains: None,
                    covers: Some(vec![12.0]),
                }],
            },
        })
    }

    #[test]
    fn payload_roundtrip() {
        let payload = sample();
        let bytes = postcard::to_allocvec(&payload).unwrap();
        assert!(!bytes.is_empty());
        let decoded: Payload = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn truncated_payload_fails() {
        let bytes = postcard::to_allocvec(&sample()).unwrap();
        assert!(postcard::from_bytes::<Payload>(&bytes[..bytes.len() / 2]).is_err());
    }
}
