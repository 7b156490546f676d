//! Canonical tree representation (SoA) and read-only tree interface.
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage for traversal
//! - [`TreeView`]: Read-only trait for unified tree access
//! - [`TreeValidationError`]: Structural validation errors
//!
//! For tree construction during training or loading, see
//! [`super::mutable_tree::MutableTree`].
//!
//! # Split semantics
//!
//! A numeric split sends a sample left when `value <= threshold`. Missing
//! values (NaN) follow the node's default direction.

use thiserror::Error;

use super::leaf::LeafValue;
use super::NodeId;

// ============================================================================
// TreeView Trait
// ============================================================================

/// Read-only view of a tree for traversal.
///
/// Implemented for both [`Tree`] and [`super::MutableTree`], so routing code
/// works the same during growth and at inference.
pub trait TreeView {
    /// The leaf value type (e.g., `ScalarLeaf`).
    type LeafValue: LeafValue;

    /// Number of nodes in the tree.
    fn n_nodes(&self) -> usize;

    /// Check if a node is a leaf.
    fn is_leaf(&self, node: NodeId) -> bool;

    /// Get the feature index for a split node.
    fn split_index(&self, node: NodeId) -> u32;

    /// Get the split threshold for a numeric split.
    fn split_threshold(&self, node: NodeId) -> f32;

    /// Get the left child node index.
    fn left_child(&self, node: NodeId) -> NodeId;

    /// Get the right child node index.
    fn right_child(&self, node: NodeId) -> NodeId;

    /// Get the default direction for missing values.
    fn default_left(&self, node: NodeId) -> bool;

    /// Get the leaf value at a leaf node.
    fn leaf_value(&self, node: NodeId) -> &Self::LeafValue;

    /// Route one split decision.
    #[inline]
    fn next_node(&self, node: NodeId, fvalue: f32) -> NodeId {
        let go_left = if fvalue.is_nan() {
            self.default_left(node)
        } else {
            fvalue <= self.split_threshold(node)
        };
        if go_left {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Traverse the tree to find the leaf node for a sample.
    ///
    /// `sample` must have at least `split_index + 1` entries for every split
    /// on the path; [`Tree::validate_features`] guarantees this for rows of
    /// the model's feature count.
    #[inline]
    fn traverse_to_leaf(&self, sample: &[f32]) -> NodeId {
        let mut node = 0;
        while !self.is_leaf(node) {
            let fvalue = sample[self.split_index(node) as usize];
            node = self.next_node(node, fvalue);
        }
        node
    }
}

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    #[error("tree has no nodes")]
    EmptyTree,
    /// A child pointer references an out-of-bounds node.
    #[error("node {node}: {side} child {child} is out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    /// A node references itself as a child.
    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },
    /// A node was reached by more than one path.
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    /// A cycle was detected during traversal.
    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },
    /// A node exists in storage but is unreachable from the root.
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    /// A split references a feature the model does not have.
    #[error("node {node} splits on feature {feature} but the model has {n_features}")]
    FeatureOutOfRange { node: NodeId, feature: u32, n_features: usize },
    /// A split threshold or leaf value is NaN or infinite.
    #[error("node {node} holds a non-finite value")]
    NonFiniteValue { node: NodeId },
    /// A leaf carries the wrong number of outputs.
    #[error("leaf {node} has {actual} outputs, expected {expected}")]
    LeafWidthMismatch { node: NodeId, expected: usize, actual: usize },
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays tree storage.
///
/// Stores tree nodes in flat arrays. Child indices are local to this tree
/// (0 = root).
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<L: LeafValue> {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[L]>,
    /// Optional gain at each split node (0 for leaves).
    gains: Option<Box<[f32]>>,
    /// Optional cover (hessian sum or sample weight) at each node.
    covers: Option<Box<[f32]>>,
}

impl<L: LeafValue> Tree<L> {
    /// Create a new tree from parallel arrays.
    ///
    /// All arrays must have the same length (number of nodes). Leaf slots of
    /// the split arrays and split slots of `leaf_values` are ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<L>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            gains: None,
            covers: None,
        }
    }

    /// Single-leaf tree.
    pub fn leaf(value: L) -> Self {
        Self::new(vec![0], vec![0.0], vec![0], vec![0], vec![false], vec![true], vec![value])
    }

    // =========================================================================
    // Explainability: Gains and Covers
    // =========================================================================

    /// Set the gains for this tree (builder pattern).
    pub fn with_gains(mut self, gains: Vec<f32>) -> Self {
        debug_assert_eq!(gains.len(), self.n_nodes());
        self.gains = Some(gains.into_boxed_slice());
        self
    }

    /// Set the covers for this tree (builder pattern).
    pub fn with_covers(mut self, covers: Vec<f32>) -> Self {
        debug_assert_eq!(covers.len(), self.n_nodes());
        self.covers = Some(covers.into_boxed_slice());
        self
    }

    #[inline]
    pub fn gains(&self) -> Option<&[f32]> {
        self.gains.as_deref()
    }

    #[inline]
    pub fn covers(&self) -> Option<&[f32]> {
        self.covers.as_deref()
    }

    // =========================================================================
    // Raw array access (for serialization)
    // =========================================================================

    pub fn split_indices(&self) -> &[u32] {
        &self.split_indices
    }

    pub fn split_thresholds(&self) -> &[f32] {
        &self.split_thresholds
    }

    pub fn left_children(&self) -> &[u32] {
        &self.left_children
    }

    pub fn right_children(&self) -> &[u32] {
        &self.right_children
    }

    pub fn default_left_flags(&self) -> &[bool] {
        &self.default_left
    }

    pub fn leaf_flags(&self) -> &[bool] {
        &self.is_leaf
    }

    pub fn leaf_values(&self) -> &[L] {
        &self.leaf_values
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Maximum root-to-leaf depth (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeId, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }
        max_depth
    }

    /// Leaf value reached by a sample.
    #[inline]
    pub fn predict_row(&self, sample: &[f32]) -> &L {
        self.leaf_value(self.traverse_to_leaf(sample))
    }

    /// Validate basic structural invariants for this tree.
    ///
    /// Every node must be reachable from the root by exactly one path and all
    /// child pointers must be in bounds.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, u8)> = vec![(0, 0)];

        while let Some((node, phase)) = stack.pop() {
            let node_usize = node as usize;

            if phase == 1 {
                color[node_usize] = 2;
                continue;
            }

            match color[node_usize] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }

            color[node_usize] = 1;
            stack.push((node, 1));

            if !self.is_leaf(node) {
                let left = self.left_child(node);
                let right = self.right_child(node);

                if left == node || right == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                for (side, child) in [("left", left), ("right", right)] {
                    if child as usize >= n_nodes {
                        return Err(TreeValidationError::ChildOutOfBounds {
                            node,
                            side,
                            child,
                            n_nodes,
                        });
                    }
                }

                // Visit children
                stack.push((right, 0));
                stack.push((left, 0));
            }
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as NodeId });
        }

        Ok(())
    }

    /// Check split features, value finiteness and leaf width.
    ///
    /// Call after [`validate`](Self::validate) when loading from untrusted input.
    pub fn validate_values(
        &self,
        n_features: usize,
        leaf_width: usize,
    ) -> Result<(), TreeValidationError> {
        for node in 0..self.n_nodes() as NodeId {
            if self.is_leaf(node) {
                let value = self.leaf_value(node);
                if !value.is_finite() {
                    return Err(TreeValidationError::NonFiniteValue { node });
                }
                if value.width() != leaf_width {
                    return Err(TreeValidationError::LeafWidthMismatch {
                        node,
                        expected: leaf_width,
                        actual: value.width(),
                    });
                }
            } else {
                let feature = self.split_index(node);
                if feature as usize >= n_features {
                    return Err(TreeValidationError::FeatureOutOfRange {
                        node,
                        feature,
                        n_features,
                    });
                }
                // Infinite thresholds are legal (everything goes one way); NaN is not.
                if self.split_threshold(node).is_nan() {
                    return Err(TreeValidationError::NonFiniteValue { node });
                }
            }
        }
        Ok(())
    }
}

impl<L: LeafValue> TreeView for Tree<L> {
    type LeafValue = L;

    #[inline]
    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    fn leaf_value(&self, node: NodeId) -> &L {
        &self.leaf_values[node as usize]
    }
}
