//! Random forest model.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use crate::data::Dataset;
use crate::model::classifier::{check_features, Classifier, PredictError};
use crate::model::importance::{
    compute_forest_importance, ExplainError, FeatureImportance, ImportanceType,
};
use crate::model::meta::ModelMeta;
use crate::model::ModelError;
use crate::repr::{Forest, VectorLeaf};
use crate::training::{RandomForestTrainer, TrainError};
use crate::utils::Parallelism;

use super::RandomForestConfig;

/// Bagged classification trees with class-distribution leaves.
///
/// Probabilities are the mean of the per-tree leaf distributions.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestModel {
    forest: Forest<VectorLeaf>,
    meta: ModelMeta,
    attributes: BTreeMap<String, String>,
}

impl RandomForestModel {
    /// Reassemble a model, checking that forest and metadata agree.
    pub fn from_parts(
        forest: Forest<VectorLeaf>,
        meta: ModelMeta,
        attributes: BTreeMap<String, String>,
    ) -> Result<Self, ModelError> {
        forest.validate_for(meta.n_features)?;
        if forest.n_groups() as usize != meta.n_classes() {
            return Err(ModelError::GroupMismatch {
                forest: forest.n_groups() as usize,
                task: meta.n_classes(),
            });
        }
        if forest.n_trees() == 0 {
            return Err(ModelError::Meta("random forest has no trees".to_string()));
        }
        let n_classes = meta.n_classes();
        for (tree_idx, tree) in forest.trees().enumerate() {
            let leaves = tree.leaf_flags().iter().zip(tree.leaf_values());
            if leaves.filter(|(is_leaf, _)| **is_leaf).any(|(_, v)| v.values.len() != n_classes) {
                return Err(ModelError::Meta(format!(
                    "tree {tree_idx} has leaves without {n_classes} class probabilities"
                )));
            }
        }
        meta.check_lengths().map_err(ModelError::Meta)?;
        Ok(Self { forest, meta, attributes })
    }

    pub fn train(dataset: &Dataset, config: &RandomForestConfig) -> Result<Self, TrainError> {
        let trainer = RandomForestTrainer::new(config.to_trainer_params());
        let forest = trainer.train(dataset.features(), dataset.labels(), dataset.n_classes())?;
        Ok(Self {
            forest,
            meta: ModelMeta::from_dataset(dataset),
            attributes: config.to_attributes(),
        })
    }

    pub fn forest(&self) -> &Forest<VectorLeaf> {
        &self.forest
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    /// Mean impurity decrease (`Gain`) or split count per feature.
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

    /// Predict with an explicit threading choice.
    pub fn predict_proba_with(
        &self,
        features: ArrayView2<'_, f32>,
        parallelism: Parallelism,
    ) -> Result<Array2<f32>, PredictError> {
        check_features(features, self.meta.n_features)?;
        let mut sums = self.forest.predict_batch(features, parallelism);
        let n_trees = self.forest.n_trees() as f32;
        sums.mapv_inplace(|v| v / n_trees);
        Ok(sums)
    }
}

impl Classifier for RandomForestModel {
    fn n_classes(&self) -> usize {
        self.meta.n_classes()
    }

    fn n_features(&self) -> usize {
        self.meta.n_features
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError> {
        self.predict_proba_with(features, Parallelism::Sequential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Tree;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(left: [f32; 2], right: [f32; 2]) -> Tree<VectorLeaf> {
        Tree::new(
            vec![0, 0, 0],
            vec![0.5, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![
                VectorLeaf::default(),
                VectorLeaf::new(left.to_vec()),
                VectorLeaf::new(right.to_vec()),
            ],
        )
    }

    #[test]
    fn probabilities_are_tree_means() {
        let mut forest = Forest::new(2);
        forest.push_tree(stump([1.0, 0.0], [0.0, 1.0]), 0);
        forest.push_tree(stump([0.5, 0.5], [0.0, 1.0]), 0);
        let meta = ModelMeta::for_multiclass(1, 2);
        let model = RandomForestModel::from_parts(forest, meta, BTreeMap::new()).unwrap();
        let proba = model.predict_proba(array![[0.0f32], [1.0]].view()).unwrap();
        assert_abs_diff_eq!(proba[[0, 0]], 0.75);
        assert_abs_diff_eq!(proba[[1, 1]], 1.0);
        assert_eq!(model.predict(array![[0.0f32]].view()).unwrap()[0], 0);
    }

    #[test]
    fn empty_forest_is_rejected() {
        let forest = Forest::<VectorLeaf>::new(2);
        let meta = ModelMeta::for_multiclass(1, 2);
        assert!(RandomForestModel::from_parts(forest, meta, BTreeMap::new()).is_err());
    }

    #[test]
    fn trains_on_iris() {
        let split = crate::data::load_iris_split().unwrap();
        let config = RandomForestConfig::builder().n_trees(20).build().unwrap();
        let model = RandomForestModel::train(&split.train, &config).unwrap();
        assert_eq!(model.n_trees(), 20);

        let predicted = model.predict(split.test.features()).unwrap();
        let acc = crate::training::accuracy(predicted.view(), split.test.labels());
        assert!(acc > 0.8, "accuracy {acc}");

        let seq = model.predict_proba_with(split.test.features(), Parallelism::Sequential).unwrap();
        let par = model.predict_proba_with(split.test.features(), Parallelism::Parallel).unwrap();
        assert_eq!(seq, par);
    }
}
