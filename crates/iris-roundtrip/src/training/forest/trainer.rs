//! Random forest trainer (bagged Gini trees).
//!
//! Each tree draws a bootstrap sample, then grows depth-first with a random
//! subset of candidate features per node. Leaves hold the class distribution
//! of the (weighted) samples that reached them.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::repr::{Forest, MutableTree, Tree, VectorLeaf};
use crate::training::gbdt::split::midpoint_threshold;
use crate::training::logger::{TrainingLogger, Verbosity};
use crate::training::{validate_inputs, TrainError};
use crate::utils::Parallelism;

/// Number of features examined per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1.
    #[default]
    Sqrt,
    /// `floor(log2(n_features))`, at least 1.
    Log2,
    /// Every feature.
    All,
    /// A fixed count, clamped to `1..=n_features`.
    Count(u32),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Parameters for random forest training.
#[derive(Clone, Debug)]
pub struct RandomForestParams {
    pub n_trees: u32,
    /// Depth limit; `None` grows until leaves are pure or too small.
    pub max_depth: Option<u32>,
    /// Minimum samples required to split a node.
    pub min_samples_split: u32,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: u32,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree.
    pub bootstrap: bool,
    /// Tree `i` is seeded with `seed + i`.
    pub seed: u64,
    pub parallelism: Parallelism,
    pub verbosity: Verbosity,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
            parallelism: Parallelism::Parallel,
            verbosity: Verbosity::default(),
        }
    }
}

/// Random forest trainer.
pub struct RandomForestTrainer {
    params: RandomForestParams,
}

struct Split {
    feature: u32,
    threshold: f32,
    /// Sum over both children of `Σ_c w_c² / w`; larger is purer.
    proxy: f64,
}

struct OpenNode {
    tree_node: u32,
    rows: Vec<u32>,
    depth: u32,
}

impl RandomForestTrainer {
    pub fn new(params: RandomForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    /// Train a forest of `n_trees` vector-leaf trees.
    ///
    /// All trees sit in group 0 and each leaf adds a full class distribution,
    /// so raw forest output is the sum of per-tree probabilities.
    pub fn train(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        n_classes: usize,
    ) -> Result<Forest<VectorLeaf>, TrainError> {
        validate_inputs(features, labels, n_classes)?;
        let (n_rows, n_features) = features.dim();

        let mut logger = TrainingLogger::new(self.params.verbosity, "random_forest");
        logger.start_training(self.params.n_trees as usize, n_rows, n_features);

        let trees = self.params.parallelism.maybe_par_map(self.params.n_trees as usize, |t| {
            let seed = self.params.seed.wrapping_add(t as u64);
            self.grow_tree(features, labels, n_classes, seed)
        });

        let mut forest = Forest::<VectorLeaf>::new(n_classes as u32);
        for tree in trees {
            forest.push_tree(tree, 0);
        }

        logger.finish_training(forest.n_trees());
        Ok(forest)
    }

    fn grow_tree(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        n_classes: usize,
        seed: u64,
    ) -> Tree<VectorLeaf> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_rows = features.nrows();
        let n_features = features.ncols();

        let weights = if self.params.bootstrap {
            let mut counts = vec![0.0f64; n_rows];
            for _ in 0..n_rows {
                counts[rng.gen_range(0..n_rows)] += 1.0;
            }
            counts
        } else {
            vec![1.0; n_rows]
        };
        let rows: Vec<u32> = (0..n_rows as u32).filter(|&r| weights[r as usize] > 0.0).collect();

        let k = self.params.max_features.resolve(n_features);
        let mut feature_order: Vec<u32> = (0..n_features as u32).collect();
        let mut builder = MutableTree::<VectorLeaf>::with_capacity(2 * rows.len()).with_stats();
        let root = builder.init_root();

        // Depth-first; the stack pops the left child first.
        let mut stack = vec![OpenNode { tree_node: root, rows, depth: 0 }];
        while let Some(node) = stack.pop() {
            let class_weights = class_weights(&node.rows, labels, &weights, n_classes);
            let total: f64 = class_weights.iter().sum();
            builder.set_cover(node.tree_node, total as f32);

            let n_node = node.rows.len() as u32;
            let is_pure = class_weights.iter().filter(|&&w| w > 0.0).count() <= 1;
            let depth_reached = self.params.max_depth.is_some_and(|d| node.depth >= d);
            let too_small = n_node < self.params.min_samples_split.max(2)
                || n_node < 2 * self.params.min_samples_leaf.max(1);

            let split = if is_pure || depth_reached || too_small {
                None
            } else {
                feature_order.shuffle(&mut rng);
                self.find_split(
                    features,
                    labels,
                    &weights,
                    &node.rows,
                    &feature_order,
                    k,
                    n_classes,
                )
            };

            let Some(split) = split else {
                builder.make_leaf(node.tree_node, VectorLeaf::from_class_weights(&class_weights));
                continue;
            };

            let parent_impurity = total - sum_squares(&class_weights) / total;
            builder.set_gain(node.tree_node, (parent_impurity - (total - split.proxy)) as f32);

            let (left_rows, right_rows): (Vec<u32>, Vec<u32>) =
                node.rows.iter().copied().partition(|&r| {
                    let v = features[[r as usize, split.feature as usize]];
                    v.is_nan() || v <= split.threshold
                });
            let (left, right) =
                builder.apply_numeric_split(node.tree_node, split.feature, split.threshold, true);
            let depth = node.depth + 1;
            stack.push(OpenNode { tree_node: right, rows: right_rows, depth });
            stack.push(OpenNode { tree_node: left, rows: left_rows, depth });
        }

        builder.freeze()
    }

    /// Best Gini split over features visited in `feature_order`.
    ///
    /// Stops after `k` non-constant features have been examined. Missing
    /// values are routed left.
    #[allow(clippy::too_many_arguments)]
    fn find_split(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        weights: &[f64],
        rows: &[u32],
        feature_order: &[u32],
        k: usize,
        n_classes: usize,
    ) -> Option<Split> {
        let min_leaf = self.params.min_samples_leaf.max(1) as usize;
        let mut best: Option<Split> = None;
        let mut visited = 0usize;
        let mut entries: Vec<(f32, usize, f64)> = Vec::with_capacity(rows.len());

        for &feature in feature_order {
            if visited >= k {
                break;
            }

            entries.clear();
            let mut missing = vec![0.0f64; n_classes];
            let mut n_missing = 0usize;
            for &r in rows {
                let v = features[[r as usize, feature as usize]];
                let class = labels[r as usize] as usize;
                let w = weights[r as usize];
                if v.is_nan() {
                    missing[class] += w;
                    n_missing += 1;
                } else {
                    entries.push((v, class, w));
                }
            }
            if entries.len() < 2 {
                continue;
            }
            entries.sort_by(|a, b| a.0.total_cmp(&b.0));
            if entries[0].0 >= entries[entries.len() - 1].0 {
                // Constant features do not count towards `k`.
                continue;
            }
            visited += 1;

            let mut right = vec![0.0f64; n_classes];
            for &(_, class, w) in &entries {
                right[class] += w;
            }
            let mut left = missing.clone();

            for i in 0..entries.len() - 1 {
                let (value, class, w) = entries[i];
                left[class] += w;
                right[class] -= w;
                let next = entries[i + 1].0;
                if value >= next {
                    continue;
                }
                let n_left = i + 1 + n_missing;
                let n_right = entries.len() - i - 1;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let wl: f64 = left.iter().sum();
                let wr: f64 = right.iter().sum();
                if wl <= 0.0 || wr <= 0.0 {
                    continue;
                }
                let proxy = sum_squares(&left) / wl + sum_squares(&right) / wr;
                if best.as_ref().is_none_or(|b| proxy > b.proxy) {
                    best = Some(Split {
                        feature,
                        threshold: midpoint_threshold(value, next),
                        proxy,
                    });
                }
            }
        }

        best
    }
}

fn class_weights(
    rows: &[u32],
    labels: ArrayView1<'_, u32>,
    weights: &[f64],
    n_classes: usize,
) -> Vec<f64> {
    let mut out = vec![0.0f64; n_classes];
    for &r in rows {
        out[labels[r as usize] as usize] += weights[r as usize];
    }
    out
}

#[inline]
fn sum_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::TreeView;
    use crate::utils::argmax;
    use ndarray::{array, Array1, Array2};

    fn two_clusters() -> (Array2<f32>, Array1<u32>) {
        let x = array![
            [1.0f32, 7.0],
            [1.2, 3.0],
            [0.8, 5.0],
            [1.1, 1.0],
            [5.0, 2.0],
            [5.2, 6.0],
            [4.9, 4.0],
            [5.1, 8.0],
        ];
        let y = array![0u32, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(4), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Log2.resolve(8), 3);
        assert_eq!(MaxFeatures::All.resolve(5), 5);
        assert_eq!(MaxFeatures::Count(10).resolve(3), 3);
    }

    #[test]
    fn single_tree_without_bootstrap_is_pure() {
        let (x, y) = two_clusters();
        let trainer = RandomForestTrainer::new(RandomForestParams {
            n_trees: 1,
            bootstrap: false,
            max_features: MaxFeatures::All,
            ..Default::default()
        });
        let forest = trainer.train(x.view(), y.view(), 2).unwrap();
        let tree = forest.tree(0);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.split_index(0), 0);
        assert!(tree.split_threshold(0) > 1.2 && tree.split_threshold(0) < 4.9);
        assert_eq!(tree.predict_row(&[1.0, 0.0]).values, vec![1.0, 0.0]);
        assert!(tree.covers().is_some_and(|c| c[0] == 8.0));
    }

    #[test]
    fn forest_classifies_clusters() {
        let (x, y) = two_clusters();
        let trainer =
            RandomForestTrainer::new(RandomForestParams { n_trees: 25, ..Default::default() });
        let forest = trainer.train(x.view(), y.view(), 2).unwrap();
        assert_eq!(forest.n_trees(), 25);
        assert!(forest.validate_for(2).is_ok());

        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let scores = forest.predict_row(&row.to_vec());
            assert_eq!(argmax(&scores), label as usize);
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let (x, y) = two_clusters();
        let seq = RandomForestTrainer::new(RandomForestParams {
            n_trees: 8,
            parallelism: Parallelism::Sequential,
            ..Default::default()
        })
        .train(x.view(), y.view(), 2)
        .unwrap();
        let par = RandomForestTrainer::new(RandomForestParams {
            n_trees: 8,
            parallelism: Parallelism::Parallel,
            ..Default::default()
        })
        .train(x.view(), y.view(), 2)
        .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn depth_limit_is_respected() {
        let (x, y) = two_clusters();
        let forest = RandomForestTrainer::new(RandomForestParams {
            n_trees: 4,
            max_depth: Some(0),
            ..Default::default()
        })
        .train(x.view(), y.view(), 2)
        .unwrap();
        assert!(forest.trees().all(|t| t.n_nodes() == 1));
    }

    #[test]
    fn rejects_labels_out_of_range() {
        let (x, _) = two_clusters();
        let y = Array1::from(vec![0u32, 0, 0, 0, 1, 1, 1, 5]);
        let err = RandomForestTrainer::new(RandomForestParams::default())
            .train(x.view(), y.view(), 2)
            .unwrap_err();
        assert!(matches!(err, TrainError::LabelOutOfRange { label: 5, .. }));
    }
}
