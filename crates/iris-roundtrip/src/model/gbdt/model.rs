//! GBDT model implementation.
//!
//! High-level wrapper around [`Forest`] with training and prediction.
//! Access components via [`forest()`](GBDTModel::forest), [`meta()`](GBDTModel::meta),
//! and [`attributes()`](GBDTModel::attributes).

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use crate::data::Dataset;
use crate::model::classifier::{check_features, Classifier, PredictError};
use crate::model::importance::{
    compute_forest_importance, ExplainError, FeatureImportance, ImportanceType,
};
use crate::model::meta::{ModelMeta, TaskKind};
use crate::model::ModelError;
use crate::repr::{Forest, ScalarLeaf};
use crate::training::objectives::{sigmoid, softmax_in_place};
use crate::training::{
    EvalSet, GBDTTrainer, MulticlassAccuracy, MulticlassLogLoss, SoftmaxLoss, TrainError,
};
use crate::utils::Parallelism;

use super::{EvalMetric, GBDTConfig};

/// High-level GBDT model with training, prediction, and explainability.
#[derive(Debug, Clone, PartialEq)]
pub struct GBDTModel {
    /// The underlying forest.
    forest: Forest<ScalarLeaf>,
    /// Model metadata.
    meta: ModelMeta,
    /// Training hyperparameters as strings (empty when the source format
    /// does not record them).
    attributes: BTreeMap<String, String>,
}

impl GBDTModel {
    /// Create a model from all its parts, checking they agree.
    ///
    /// Used by every loader after decoding a file.
    pub fn from_parts(
        forest: Forest<ScalarLeaf>,
        meta: ModelMeta,
        attributes: BTreeMap<String, String>,
    ) -> Result<Self, ModelError> {
        forest.validate_for(meta.n_features)?;
        if forest.n_groups() as usize != meta.n_groups() {
            return Err(ModelError::GroupMismatch {
                forest: forest.n_groups() as usize,
                task: meta.n_groups(),
            });
        }
        meta.check_lengths().map_err(ModelError::Meta)?;
        Ok(Self { forest, meta, attributes })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get reference to the underlying forest.
    pub fn forest(&self) -> &Forest<ScalarLeaf> {
        &self.forest
    }

    /// Get reference to model metadata.
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    // =========================================================================
    // Training
    // =========================================================================

    /// Train a new GBDT model on `dataset`.
    ///
    /// Eval sets are scored after every round and logged at debug level;
    /// they never influence the model.
    pub fn train(
        dataset: &Dataset,
        config: &GBDTConfig,
        eval_sets: &[EvalSet<'_>],
    ) -> Result<Self, TrainError> {
        let n_classes = dataset.n_classes();
        if n_classes < 2 {
            return Err(TrainError::TooFewClasses(n_classes));
        }

        let objective =
            SoftmaxLoss::new(n_classes).with_boost_from_average(config.boost_from_average);
        let params = config.to_trainer_params();
        let (features, labels) = (dataset.features(), dataset.labels());

        let forest = match config.metric {
            EvalMetric::LogLoss => {
                GBDTTrainer::new(objective, MulticlassLogLoss, params)
                    .train(features, labels, eval_sets)?
            }
            EvalMetric::Accuracy => {
                GBDTTrainer::new(objective, MulticlassAccuracy, params)
                    .train(features, labels, eval_sets)?
            }
        };

        let meta = ModelMeta::from_dataset(dataset);
        Ok(Self { forest, meta, attributes: config.to_attributes() })
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Raw scores before the output transform, shape `[n_rows, n_groups]`.
    pub fn predict_raw(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError> {
        check_features(features, self.meta.n_features)?;
        Ok(self.forest.predict_batch(features, Parallelism::Sequential))
    }

    // =========================================================================
    // Explainability
    // =========================================================================

    /// Per-feature importance over every tree.
    ///
    /// `Gain` needs per-node gains; the text format keeps them as `split_gain`.
    pub fn feature_importance(
        &self,
        importance_type: ImportanceType,
    ) -> Result<FeatureImportance, ExplainError> {
        compute_forest_importance(
            &self.forest,
            self.meta.n_features,
            importance_type,
            self.meta.feature_names.clone(),
        )
    }
}

impl Classifier for GBDTModel {
    fn n_classes(&self) -> usize {
        self.meta.n_classes()
    }

    fn n_features(&self) -> usize {
        self.meta.n_features
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError> {
        let raw = self.predict_raw(features)?;
        match self.meta.task {
            TaskKind::Regression => Err(PredictError::NotAClassifier),
            TaskKind::BinaryClassification => {
                Ok(Array2::from_shape_fn((raw.nrows(), 2), |(r, c)| {
                    let p = sigmoid(raw[[r, 0]]);
                    if c == 1 { p } else { 1.0 - p }
                }))
            }
            TaskKind::MulticlassClassification { .. } => {
                let mut proba = raw;
                for mut row in proba.rows_mut() {
                    match row.as_slice_mut() {
                        Some(values) => softmax_in_place(values),
                        None => {
                            let mut values = row.to_vec();
                            softmax_in_place(&mut values);
                            row.assign(&ndarray::ArrayView1::from(&values[..]));
                        }
                    }
                }
                Ok(proba)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gbdt::TreeParams;
    use crate::repr::Tree;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(threshold: f32, left: f32, right: f32) -> Tree<ScalarLeaf> {
        Tree::new(
            vec![0, 0, 0],
            vec![threshold, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![ScalarLeaf(0.0), ScalarLeaf(left), ScalarLeaf(right)],
        )
    }

    fn three_class_model() -> GBDTModel {
        let mut forest = Forest::new(3);
        forest.push_tree(stump(0.5, 2.0, 0.0), 0);
        forest.push_tree(stump(0.5, 0.0, 2.0), 1);
        forest.push_tree(stump(0.5, 0.0, 0.0), 2);
        GBDTModel::from_parts(forest, ModelMeta::for_multiclass(1, 3), BTreeMap::new()).unwrap()
    }

    #[test]
    fn softmax_probabilities() {
        let model = three_class_model();
        let proba = model.predict_proba(array![[0.0f32], [1.0]].view()).unwrap();
        assert_eq!(proba.dim(), (2, 3));
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
        assert_eq!(model.predict(array![[0.0f32], [1.0]].view()).unwrap().to_vec(), vec![0, 1]);
    }

    #[test]
    fn binary_task_uses_sigmoid() {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(0.5, -3.0, 3.0), 0);
        let meta = ModelMeta {
            n_features: 1,
            task: TaskKind::BinaryClassification,
            ..Default::default()
        };
        let model = GBDTModel::from_parts(forest, meta, BTreeMap::new()).unwrap();
        let proba = model.predict_proba(array![[1.0f32]].view()).unwrap();
        assert_abs_diff_eq!(proba[[0, 1]], sigmoid(3.0), epsilon = 1e-6);
        assert_eq!(model.n_classes(), 2);
    }

    #[test]
    fn regression_is_not_a_classifier() {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(0.5, -3.0, 3.0), 0);
        let meta = ModelMeta { n_features: 1, ..Default::default() };
        let model = GBDTModel::from_parts(forest, meta, BTreeMap::new()).unwrap();
        assert_eq!(model.predict_proba(array![[1.0f32]].view()), Err(PredictError::NotAClassifier));
    }

    #[test]
    fn from_parts_rejects_inconsistent_parts() {
        let mut forest = Forest::new(2);
        forest.push_tree(stump(0.5, 0.0, 1.0), 0);
        let meta = ModelMeta::for_multiclass(1, 3);
        let err = GBDTModel::from_parts(forest.clone(), meta, BTreeMap::new());
        assert!(matches!(err, Err(ModelError::GroupMismatch { forest: 2, task: 3 })));

        let meta = ModelMeta::for_multiclass(1, 2).with_class_names(vec!["a".into()]);
        assert!(matches!(
            GBDTModel::from_parts(forest, meta, BTreeMap::new()),
            Err(ModelError::Meta(_))
        ));
    }

    #[test]
    fn wrong_feature_count() {
        let model = three_class_model();
        let err = model.predict_proba(array![[0.0f32, 1.0]].view());
        assert_eq!(err, Err(PredictError::FeatureCountMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn trains_on_iris() {
        let split = crate::data::load_iris_split().unwrap();
        let config = GBDTConfig::builder()
            .n_trees(10)
            .tree(TreeParams::depth_wise(3))
            .build()
            .unwrap();
        let model = GBDTModel::train(&split.train, &config, &[]).unwrap();
        assert_eq!(model.forest().n_trees(), 30);
        assert_eq!(model.meta().n_classes(), 3);
        assert_eq!(model.attributes()["max_depth"], "3");

        let predicted = model.predict(split.test.features()).unwrap();
        let acc = crate::training::accuracy(predicted.view(), split.test.labels());
        assert!(acc > 0.8, "accuracy {acc}");

        let importance = model.feature_importance(ImportanceType::Gain).unwrap();
        assert_eq!(importance.values().len(), 4);
        assert!(importance.values().iter().sum::<f64>() > 0.0);
    }
}
