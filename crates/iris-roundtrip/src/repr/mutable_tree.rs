//! Growable tree used while training or loading.
//!
//! Nodes are allocated on demand: [`MutableTree::init_root`] creates the root
//! placeholder, each [`MutableTree::apply_numeric_split`] appends two child
//! placeholders, and [`MutableTree::make_leaf`] turns a placeholder into a
//! leaf. [`MutableTree::freeze`] produces an immutable [`Tree`].

use super::leaf::{LeafValue, ScalarLeaf};
use super::tree::{Tree, TreeView};
use super::NodeId;

/// Mutable SoA tree builder.
#[derive(Debug, Clone, Default)]
pub struct MutableTree<L: LeafValue> {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<L>,
    gains: Vec<f32>,
    covers: Vec<f32>,
    track_stats: bool,
}

impl<L: LeafValue> MutableTree<L> {
    /// Create an empty builder with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            split_indices: Vec::with_capacity(capacity),
            split_thresholds: Vec::with_capacity(capacity),
            left_children: Vec::with_capacity(capacity),
            right_children: Vec::with_capacity(capacity),
            default_left: Vec::with_capacity(capacity),
            is_leaf: Vec::with_capacity(capacity),
            leaf_values: Vec::with_capacity(capacity),
            gains: Vec::with_capacity(capacity),
            covers: Vec::with_capacity(capacity),
            track_stats: false,
        }
    }

    /// Record per-node gain and cover; frozen trees then carry them.
    pub fn with_stats(mut self) -> Self {
        self.track_stats = true;
        self
    }

    /// Clear all nodes, keeping allocations.
    pub fn reset(&mut self) {
        self.split_indices.clear();
        self.split_thresholds.clear();
        self.left_children.clear();
        self.right_children.clear();
        self.default_left.clear();
        self.is_leaf.clear();
        self.leaf_values.clear();
        self.gains.clear();
        self.covers.clear();
    }

    fn push_placeholder(&mut self) -> NodeId {
        let id = self.is_leaf.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        // Placeholders are leaves until split.
        self.is_leaf.push(true);
        self.leaf_values.push(L::default());
        self.gains.push(0.0);
        self.covers.push(0.0);
        id
    }

    /// Reset and allocate the root node. Returns its id (always 0).
    pub fn init_root(&mut self) -> NodeId {
        self.reset();
        self.push_placeholder()
    }

    /// Turn `node` into a numeric split and allocate its two children.
    ///
    /// Returns `(left, right)`.
    pub fn apply_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
    ) -> (NodeId, NodeId) {
        let left = self.push_placeholder();
        let right = self.push_placeholder();
        let i = node as usize;
        self.split_indices[i] = feature;
        self.split_thresholds[i] = threshold;
        self.left_children[i] = left;
        self.right_children[i] = right;
        self.default_left[i] = default_left;
        self.is_leaf[i] = false;
        (left, right)
    }

    /// Set the leaf value of `node`.
    pub fn make_leaf(&mut self, node: NodeId, value: L) {
        let i = node as usize;
        self.is_leaf[i] = true;
        self.leaf_values[i] = value;
    }

    /// Record the split gain at `node`.
    pub fn set_gain(&mut self, node: NodeId, gain: f32) {
        self.gains[node as usize] = gain;
    }

    /// Record the cover (hessian sum or sample weight) at `node`.
    pub fn set_cover(&mut self, node: NodeId, cover: f32) {
        self.covers[node as usize] = cover;
    }

    /// Finish construction and return an immutable tree.
    pub fn freeze(self) -> Tree<L> {
        let tree = Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        );
        if self.track_stats {
            tree.with_gains(self.gains).with_covers(self.covers)
        } else {
            tree
        }
    }
}

impl MutableTree<ScalarLeaf> {
    /// Multiply every leaf value by the learning rate.
    pub fn apply_learning_rate(&mut self, learning_rate: f32) {
        for (leaf, &is_leaf) in self.leaf_values.iter_mut().zip(&self.is_leaf) {
            if is_leaf {
                leaf.0 *= learning_rate;
            }
        }
    }
}

impl<L: LeafValue> TreeView for MutableTree<L> {
    type LeafValue = L;

    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    fn leaf_value(&self, node: NodeId) -> &L {
        &self.leaf_values[node as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_freeze() {
        let mut builder = MutableTree::<ScalarLeaf>::with_capacity(3).with_stats();
        let root = builder.init_root();
        let (left, right) = builder.apply_numeric_split(root, 2, 1.5, true);
        builder.set_gain(root, 4.0);
        builder.set_cover(root, 10.0);
        builder.make_leaf(left, ScalarLeaf(-1.0));
        builder.make_leaf(right, ScalarLeaf(2.0));
        builder.apply_learning_rate(0.5);

        assert_eq!(builder.traverse_to_leaf(&[0.0, 0.0, 1.5]), left);

        let tree = builder.freeze();
        assert!(tree.validate().is_ok());
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_row(&[0.0, 0.0, 1.0]).0, -0.5);
        assert_eq!(tree.predict_row(&[0.0, 0.0, 2.0]).0, 1.0);
        assert_eq!(tree.gains().unwrap()[0], 4.0);
        assert_eq!(tree.covers().unwrap()[0], 10.0);
    }

    #[test]
    fn init_root_resets_previous_tree() {
        let mut builder = MutableTree::<ScalarLeaf>::with_capacity(3);
        let root = builder.init_root();
        builder.apply_numeric_split(root, 0, 0.0, false);
        let root = builder.init_root();
        builder.make_leaf(root, ScalarLeaf(3.0));
        let tree = builder.freeze();
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.gains().is_none());
    }
}
