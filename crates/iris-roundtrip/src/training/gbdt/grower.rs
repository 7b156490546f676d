//! Tree grower for gradient boosting.
//!
//! Orchestrates tree training: exact split finding per open node, row
//! partitioning with the inference routing rule, and the growth strategy
//! that decides which node to expand next.

use ndarray::ArrayView2;

use crate::repr::{MutableTree, ScalarLeaf, Tree};
use crate::training::gradients::GradsTuple;

use super::expansion::{GrowthState, GrowthStrategy, NodeCandidate};
use super::split::{ExactSplitter, GainParams, SplitInfo};

/// Parameters for tree growth.
#[derive(Clone, Debug)]
pub struct GrowerParams {
    /// Gain computation and constraint parameters (regularization, min child weight, etc.).
    pub gain: GainParams,
    /// Learning rate.
    pub learning_rate: f32,
    /// Tree growth strategy (includes depth/leaf limits).
    pub growth_strategy: GrowthStrategy,
}

impl Default for GrowerParams {
    fn default() -> Self {
        Self {
            gain: GainParams::default(),
            learning_rate: 0.3,
            growth_strategy: GrowthStrategy::default(),
        }
    }
}

/// Tree grower for gradient boosting.
///
/// Grows a single decision tree from the gradient and hessian pairs of one
/// output. Leaf values are scaled by the learning rate, so the returned tree
/// can be added to the forest as is.
pub struct TreeGrower {
    params: GrowerParams,
    splitter: ExactSplitter,
}

impl TreeGrower {
    pub fn new(params: GrowerParams) -> Self {
        let splitter = ExactSplitter::new(params.gain.clone());
        Self { params, splitter }
    }

    pub fn params(&self) -> &GrowerParams {
        &self.params
    }

    /// Grow a tree.
    ///
    /// # Arguments
    /// * `features` - Sample-major feature matrix
    /// * `pairs` - Gradient pairs of one output, one per sample
    /// * `rows` - Rows used for this tree (all rows, or a sampled subset)
    /// * `features_allowed` - Sorted feature indices the tree may split on
    pub fn grow(
        &self,
        features: ArrayView2<'_, f32>,
        pairs: &[GradsTuple],
        rows: Vec<u32>,
        features_allowed: &[u32],
    ) -> Tree<ScalarLeaf> {
        let capacity = 2 * self.params.growth_strategy.max_leaves() - 1;
        let mut builder = MutableTree::<ScalarLeaf>::with_capacity(capacity).with_stats();
        let mut state = self.params.growth_strategy.init();

        let root = builder.init_root();
        let (grad_sum, hess_sum) = sum_pairs(pairs, &rows);
        let split = self.find_split(features, pairs, &rows, features_allowed, grad_sum, hess_sum);
        state.push_root(NodeCandidate {
            tree_node: root,
            rows,
            depth: 0,
            grad_sum,
            hess_sum,
            split,
        });

        while state.should_continue() {
            for candidate in state.pop_next() {
                if state.can_split(&candidate) {
                    self.expand(
                        candidate,
                        features,
                        pairs,
                        features_allowed,
                        &mut builder,
                        &mut state,
                    );
                } else {
                    self.finish_leaf(&candidate, &mut builder);
                }
            }
            state.advance();
        }

        for candidate in state.drain_remaining() {
            self.finish_leaf(&candidate, &mut builder);
        }

        builder.apply_learning_rate(self.params.learning_rate);
        builder.freeze()
    }

    fn find_split(
        &self,
        features: ArrayView2<'_, f32>,
        pairs: &[GradsTuple],
        rows: &[u32],
        features_allowed: &[u32],
        grad_sum: f64,
        hess_sum: f64,
    ) -> Option<SplitInfo> {
        if rows.len() < 2 {
            return None;
        }
        self.splitter
            .find_split(features, rows, pairs, features_allowed, grad_sum, hess_sum)
    }

    /// Split `candidate` and register both children with the growth state.
    fn expand(
        &self,
        candidate: NodeCandidate,
        features: ArrayView2<'_, f32>,
        pairs: &[GradsTuple],
        features_allowed: &[u32],
        builder: &mut MutableTree<ScalarLeaf>,
        state: &mut GrowthState,
    ) {
        let Some(split) = candidate.split.clone() else {
            self.finish_leaf(&candidate, builder);
            return;
        };

        let (left_node, right_node) = builder.apply_numeric_split(
            candidate.tree_node,
            split.feature,
            split.threshold,
            split.default_left,
        );
        builder.set_gain(candidate.tree_node, split.gain as f32);
        builder.set_cover(candidate.tree_node, candidate.hess_sum as f32);

        let (left_rows, right_rows) = partition_rows(features, &candidate.rows, &split);
        let depth = candidate.depth + 1;

        for (tree_node, rows) in [(left_node, left_rows), (right_node, right_rows)] {
            let (grad_sum, hess_sum) = sum_pairs(pairs, &rows);
            let split =
                self.find_split(features, pairs, &rows, features_allowed, grad_sum, hess_sum);
            state.push(NodeCandidate { tree_node, rows, depth, grad_sum, hess_sum, split });
        }
    }

    fn finish_leaf(&self, candidate: &NodeCandidate, builder: &mut MutableTree<ScalarLeaf>) {
        let weight = self
            .splitter
            .compute_leaf_weight(candidate.grad_sum, candidate.hess_sum);
        builder.make_leaf(candidate.tree_node, ScalarLeaf(weight));
        builder.set_cover(candidate.tree_node, candidate.hess_sum as f32);
    }
}

/// Gradient and hessian sums over `rows`, accumulated in f64.
fn sum_pairs(pairs: &[GradsTuple], rows: &[u32]) -> (f64, f64) {
    rows.iter().fold((0.0, 0.0), |(g, h), &r| {
        let p = pairs[r as usize];
        (g + p.grad as f64, h + p.hess as f64)
    })
}

/// Route rows to the children of a split, preserving their order.
///
/// Uses the same rule as inference: `value <= threshold` goes left, missing
/// values follow the default direction.
pub(crate) fn partition_rows(
    features: ArrayView2<'_, f32>,
    rows: &[u32],
    split: &SplitInfo,
) -> (Vec<u32>, Vec<u32>) {
    rows.iter().copied().partition(|&r| {
        let value = features[[r as usize, split.feature as usize]];
        if value.is_nan() {
            split.default_left
        } else {
            value <= split.threshold
        }
    })
}
