//! Canonical forest representation (collection of trees).

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use super::{LeafValue, ScalarLeaf, Tree, TreeValidationError};
use crate::utils::{Parallelism, RowMatrix};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestValidationError {
    #[error("forest has {len} base scores for {n_groups} groups")]
    BaseScoreLenMismatch { n_groups: u32, len: usize },
    #[error("forest has {n_trees} trees but {len} group assignments")]
    TreeGroupsLenMismatch { n_trees: usize, len: usize },
    #[error("tree {tree_idx} is assigned to group {group} of {n_groups}")]
    TreeGroupOutOfRange { tree_idx: usize, group: u32, n_groups: u32 },
    #[error("forest has no output groups")]
    NoGroups,
    #[error("base score is not finite")]
    NonFiniteBaseScore,
    #[error("tree {tree_idx}: {error}")]
    InvalidTree { tree_idx: usize, error: TreeValidationError },
}

/// Forest of decision trees.
///
/// Stores multiple trees with their group assignments for multi-class
/// support. Boosted forests hold one [`ScalarLeaf`] tree per class per round;
/// random forests hold vector-leaf trees that contribute to every group.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest<L: LeafValue = ScalarLeaf> {
    trees: Vec<Tree<L>>,
    tree_groups: Vec<u32>,
    n_groups: u32,
    base_score: Vec<f32>,
}

impl<L: LeafValue> Forest<L> {
    /// Create a new forest with the given number of groups.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_groups,
            base_score: vec![0.0; n_groups as usize],
        }
    }

    /// Set the base score for all groups.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        debug_assert_eq!(base_score.len(), self.n_groups as usize);
        self.base_score = base_score;
        self
    }

    /// Reassemble a forest from stored parts without checking them.
    ///
    /// Loaders call [`validate`](Self::validate) afterwards.
    pub fn from_parts(
        trees: Vec<Tree<L>>,
        tree_groups: Vec<u32>,
        n_groups: u32,
        base_score: Vec<f32>,
    ) -> Self {
        Self { trees, tree_groups, n_groups, base_score }
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree<L>, group: u32) {
        debug_assert!(group < self.n_groups, "group out of range");
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of output groups.
    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    /// Get the base score for each group.
    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree<L> {
        &self.trees[idx]
    }

    /// Get all tree group assignments as a slice.
    #[inline]
    pub fn tree_groups(&self) -> &[u32] {
        &self.tree_groups
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree<L>> {
        self.trees.iter()
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree<L>, u32)> {
        self.trees
            .iter()
            .zip(self.tree_groups.iter())
            .map(|(t, &g)| (t, g))
    }

    /// Validate structural invariants for this forest (trees, group
    /// assignments, base score).
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.n_groups == 0 {
            return Err(ForestValidationError::NoGroups);
        }
        if self.base_score.len() != self.n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups: self.n_groups,
                len: self.base_score.len(),
            });
        }
        if self.base_score.iter().any(|b| !b.is_finite()) {
            return Err(ForestValidationError::NonFiniteBaseScore);
        }
        if self.tree_groups.len() != self.trees.len() {
            return Err(ForestValidationError::TreeGroupsLenMismatch {
                n_trees: self.trees.len(),
                len: self.tree_groups.len(),
            });
        }

        for (i, &g) in self.tree_groups.iter().enumerate() {
            if g >= self.n_groups {
                return Err(ForestValidationError::TreeGroupOutOfRange {
                    tree_idx: i,
                    group: g,
                    n_groups: self.n_groups,
                });
            }
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| ForestValidationError::InvalidTree { tree_idx: i, error: e })?;
        }

        Ok(())
    }

    /// [`validate`](Self::validate) plus per-node value checks against the
    /// model's feature count.
    pub fn validate_for(&self, n_features: usize) -> Result<(), ForestValidationError> {
        self.validate()?;
        let leaf_width = self.leaf_width();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate_values(n_features, leaf_width)
                .map_err(|e| ForestValidationError::InvalidTree { tree_idx: i, error: e })?;
        }
        Ok(())
    }

    /// Expected number of outputs per leaf.
    fn leaf_width(&self) -> usize {
        let first_leaf = self.trees.first().and_then(|t| {
            t.leaf_flags().iter().position(|&l| l).map(|i| &t.leaf_values()[i])
        });
        match first_leaf {
            Some(v) if v.width() != 1 => self.n_groups as usize,
            _ => 1,
        }
    }

    /// Sum of base score and tree contributions for one row.
    ///
    /// Trees are applied in storage order, so the result is reproducible
    /// bit for bit.
    pub fn predict_row(&self, features: &[f32]) -> Vec<f32> {
        let mut output = self.base_score.clone();
        for (tree, group) in self.trees_with_groups() {
            tree.predict_row(features).add_to(&mut output, group as usize);
        }
        output
    }

    /// Predict raw outputs for a batch, shape `[n_rows, n_groups]`.
    ///
    /// Every row of `features` must hold at least as many columns as the
    /// largest split index; callers check the feature count first.
    pub fn predict_batch(
        &self,
        features: ArrayView2<'_, f32>,
        parallelism: Parallelism,
    ) -> Array2<f32> {
        let n_rows = features.nrows();
        let n_groups = self.n_groups as usize;
        let matrix = RowMatrix::from_view(features);

        let rows = parallelism.maybe_par_map(n_rows, |r| self.predict_row(matrix.row(r)));

        let mut output = Array2::<f32>::zeros((n_rows, n_groups));
        for (r, values) in rows.into_iter().enumerate() {
            for (g, v) in values.into_iter().enumerate() {
                output[[r, g]] = v;
            }
        }
        output
    }
}
