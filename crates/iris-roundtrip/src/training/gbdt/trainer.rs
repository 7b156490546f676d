//! GBDT Trainer for gradient boosting.
//!
//! This module provides the main training loop for gradient boosted decision trees.
//! It orchestrates objective computation, tree growing, and prediction updates.
//!
//! # Example
//!
//! ```ignore
//! use iris_roundtrip::training::{GBDTParams, GBDTTrainer, MulticlassLogLoss, SoftmaxLoss};
//!
//! let params = GBDTParams { n_trees: 50, learning_rate: 0.1, ..Default::default() };
//! let trainer = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, params);
//! let forest = trainer.train(features.view(), labels.view(), &[])?;
//! ```

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::repr::{Forest, ScalarLeaf};
use crate::training::eval::{EvalSet, MetricValue};
use crate::training::gradients::Gradients;
use crate::training::logger::{TrainingLogger, Verbosity};
use crate::training::metrics::MetricFn;
use crate::training::objectives::ObjectiveFn;
use crate::training::sampling::{sample_features, sample_rows, ColSamplingParams, RowSamplingParams};
use crate::training::{validate_inputs, TrainError};
use crate::utils::RowMatrix;

use super::expansion::GrowthStrategy;
use super::grower::{GrowerParams, TreeGrower};
use super::split::GainParams;

// =============================================================================
// GBDTParams
// =============================================================================

/// Parameters for GBDT training.
///
/// Use struct construction with `..Default::default()` for convenient configuration.
#[derive(Clone, Debug)]
pub struct GBDTParams {
    // --- Boosting parameters ---
    /// Number of boosting rounds. Each round adds one tree per output.
    pub n_trees: u32,
    /// Learning rate (shrinkage).
    pub learning_rate: f32,

    // --- Tree structure ---
    /// Tree growth strategy.
    pub growth_strategy: GrowthStrategy,

    // --- Regularization ---
    /// Gain computation parameters (regularization, min child weight, etc.).
    pub gain: GainParams,

    // --- Sampling ---
    /// Row sampling configuration.
    pub row_sampling: RowSamplingParams,
    /// Column sampling configuration.
    pub col_sampling: ColSamplingParams,

    // --- Logging ---
    /// Verbosity level for training output.
    pub verbosity: Verbosity,

    // --- Reproducibility ---
    /// Random seed.
    pub seed: u64,
}

impl Default for GBDTParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.3,
            growth_strategy: GrowthStrategy::default(),
            gain: GainParams::default(),
            row_sampling: RowSamplingParams::None,
            col_sampling: ColSamplingParams::None,
            verbosity: Verbosity::default(),
            seed: 42,
        }
    }
}

impl GBDTParams {
    /// Convert to GrowerParams for tree grower.
    fn to_grower_params(&self) -> GrowerParams {
        GrowerParams {
            gain: self.gain.clone(),
            learning_rate: self.learning_rate,
            growth_strategy: self.growth_strategy,
        }
    }
}

// =============================================================================
// GBDTTrainer
// =============================================================================

/// GBDT Trainer.
pub struct GBDTTrainer<O: ObjectiveFn, M: MetricFn> {
    objective: O,
    metric: M,
    params: GBDTParams,
}

impl<O: ObjectiveFn, M: MetricFn> GBDTTrainer<O, M> {
    /// Create a new GBDT trainer.
    pub fn new(objective: O, metric: M, params: GBDTParams) -> Self {
        Self { objective, metric, params }
    }

    pub fn params(&self) -> &GBDTParams {
        &self.params
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Train a forest.
    ///
    /// # Arguments
    /// * `features` - Sample-major feature matrix `[n_rows, n_features]`
    /// * `labels` - Class index per row
    /// * `eval_sets` - Sets evaluated after every round (logged at debug level)
    ///
    /// The forest holds `n_trees * n_outputs` trees; tree `i` belongs to
    /// output `i % n_outputs`.
    pub fn train(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        eval_sets: &[EvalSet<'_>],
    ) -> Result<Forest<ScalarLeaf>, TrainError> {
        let n_outputs = self.objective.n_outputs();
        validate_inputs(features, labels, n_outputs)?;
        let (n_rows, n_features) = features.dim();
        for set in eval_sets {
            if set.features.ncols() != n_features || set.features.nrows() != set.labels.len() {
                return Err(TrainError::EvalSetShape {
                    name: set.name.to_string(),
                    rows: set.features.nrows(),
                    cols: set.features.ncols(),
                    labels: set.labels.len(),
                });
            }
        }

        let grower = TreeGrower::new(self.params.to_grower_params());
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut gradients = Gradients::new(n_rows, n_outputs);

        let base_scores = self.objective.compute_base_score(labels);

        // Column-major raw scores: [n_outputs, n_rows].
        let mut predictions = init_predictions(&base_scores, n_rows);
        let train_matrix = RowMatrix::from_view(features);

        let evaluate = self.params.verbosity >= Verbosity::Debug && !eval_sets.is_empty();
        let eval_data: Vec<RowMatrix> = if evaluate {
            eval_sets.iter().map(|es| RowMatrix::from_view(es.features)).collect()
        } else {
            Vec::new()
        };
        let mut eval_predictions: Vec<Array2<f32>> = eval_data
            .iter()
            .map(|m| init_predictions(&base_scores, m.n_rows()))
            .collect();

        let mut forest = Forest::<ScalarLeaf>::new(n_outputs as u32).with_base_score(base_scores);

        let mut logger = TrainingLogger::new(self.params.verbosity, "gbdt");
        logger.start_training(self.params.n_trees as usize, n_rows, n_features);

        for round in 0..self.params.n_trees as usize {
            self.objective
                .compute_gradients_into(predictions.view(), labels, gradients.pairs_array_mut());

            // Grow one tree per output
            for output in 0..n_outputs {
                let rows = sample_rows(self.params.row_sampling, n_rows, &mut rng)
                    .unwrap_or_else(|| (0..n_rows as u32).collect());
                let allowed = sample_features(self.params.col_sampling, n_features, &mut rng);

                let tree = grower.grow(features, gradients.output_pairs(output), rows, &allowed);

                // Sampled-out rows still receive the tree's output.
                for r in 0..n_rows {
                    predictions[[output, r]] += tree.predict_row(train_matrix.row(r)).0;
                }
                for (matrix, preds) in eval_data.iter().zip(eval_predictions.iter_mut()) {
                    for r in 0..matrix.n_rows() {
                        preds[[output, r]] += tree.predict_row(matrix.row(r)).0;
                    }
                }

                forest.push_tree(tree, output as u32);
            }

            if evaluate {
                let round_metrics: Vec<MetricValue> = eval_sets
                    .iter()
                    .zip(&eval_predictions)
                    .map(|(set, raw)| MetricValue {
                        set: set.name.to_string(),
                        metric: self.metric.name(),
                        value: self.metric.compute(self.transform(raw).view(), set.labels),
                    })
                    .collect();
                logger.log_metrics(round, &round_metrics);
            }
        }

        logger.finish_training(forest.n_trees());
        Ok(forest)
    }

    /// Column-wise objective transform of raw scores.
    fn transform(&self, raw: &Array2<f32>) -> Array2<f32> {
        let mut out = raw.clone();
        let mut buffer = vec![0.0f32; raw.nrows()];
        for mut column in out.columns_mut() {
            for (b, v) in buffer.iter_mut().zip(column.iter()) {
                *b = *v;
            }
            self.objective.transform_row(&mut buffer);
            for (v, b) in column.iter_mut().zip(&buffer) {
                *v = *b;
            }
        }
        out
    }
}

fn init_predictions(base_scores: &[f32], n_rows: usize) -> Array2<f32> {
    let mut predictions = Array2::<f32>::zeros((base_scores.len(), n_rows));
    for (mut row, &base) in predictions.rows_mut().into_iter().zip(base_scores) {
        row.fill(base);
    }
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::MulticlassLogLoss;
    use crate::training::objectives::SoftmaxLoss;
    use crate::utils::{argmax, Parallelism};
    use ndarray::{array, Array1};

    fn three_blobs() -> (Array2<f32>, Array1<u32>) {
        let x = array![
            [0.0f32, 0.1],
            [0.2, 0.0],
            [0.1, 0.2],
            [0.3, 0.1],
            [5.0, 5.1],
            [5.2, 5.0],
            [5.1, 4.9],
            [4.9, 5.2],
            [9.0, 0.1],
            [9.2, 0.3],
            [9.1, 0.0],
            [8.9, 0.2],
        ];
        let y = array![0u32, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        (x, y)
    }

    fn params() -> GBDTParams {
        GBDTParams {
            n_trees: 20,
            learning_rate: 0.3,
            growth_strategy: GrowthStrategy::DepthWise { max_depth: 2 },
            gain: GainParams { min_child_weight: 0.0, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn trains_one_tree_per_class_per_round() {
        let (x, y) = three_blobs();
        let trainer = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, params());
        let forest = trainer.train(x.view(), y.view(), &[]).unwrap();

        assert_eq!(forest.n_trees(), 60);
        assert_eq!(forest.n_groups(), 3);
        assert_eq!(&forest.tree_groups()[..4], &[0, 1, 2, 0]);
        assert!(forest.validate_for(2).is_ok());
    }

    #[test]
    fn fits_separable_blobs() {
        let (x, y) = three_blobs();
        let trainer = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, params());
        let forest = trainer.train(x.view(), y.view(), &[]).unwrap();

        let raw = forest.predict_batch(x.view(), Parallelism::Sequential);
        for (row, &label) in raw.rows().into_iter().zip(y.iter()) {
            assert_eq!(argmax(&row.to_vec()), label as usize);
        }
    }

    #[test]
    fn training_is_deterministic_with_sampling() {
        let (x, y) = three_blobs();
        let p = GBDTParams {
            row_sampling: RowSamplingParams::Uniform { fraction: 0.75 },
            col_sampling: ColSamplingParams::PerTree { fraction: 0.5 },
            ..params()
        };
        let a = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, p.clone())
            .train(x.view(), y.view(), &[])
            .unwrap();
        let b = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, p)
            .train(x.view(), y.view(), &[])
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn eval_sets_do_not_change_the_model() {
        let (x, y) = three_blobs();
        let p = GBDTParams { verbosity: Verbosity::Debug, ..params() };
        let trainer = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, p);
        let with_eval = trainer
            .train(x.view(), y.view(), &[EvalSet::new("train", x.view(), y.view())])
            .unwrap();
        let without = trainer.train(x.view(), y.view(), &[]).unwrap();
        assert_eq!(with_eval, without);
    }

    #[test]
    fn rejects_bad_inputs() {
        let (x, y) = three_blobs();
        let trainer = GBDTTrainer::new(SoftmaxLoss::new(3), MulticlassLogLoss, params());

        let short = array![0u32, 1];
        assert!(matches!(
            trainer.train(x.view(), short.view(), &[]),
            Err(TrainError::LabelCountMismatch { .. })
        ));

        let bad_eval = array![[1.0f32]];
        let eval_labels = array![0u32];
        let eval_sets = [EvalSet::new("bad", bad_eval.view(), eval_labels.view())];
        assert!(matches!(
            trainer.train(x.view(), y.view(), &eval_sets),
            Err(TrainError::EvalSetShape { .. })
        ));
    }
}
