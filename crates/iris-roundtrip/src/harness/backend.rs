//! Backends, their artifacts and their training presets.

use std::fmt;
use std::path::Path;

use super::error::HarnessError;
use crate::model::gbdt::{EvalMetric, RegularizationParams, TreeParams};
use crate::model::{
    Classifier, ConfigError, GBDTConfig, GBDTModel, RandomForestConfig, RandomForestModel,
};
use crate::persist::{load_text, ObjectModel, OnnxSession, SerializableModel};
use crate::training::{MaxFeatures, Verbosity};

/// A model family and its on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Leaf-wise boosting, text and native files.
    LightGbm,
    /// Depth-wise boosting, native file.
    XgBoost,
    /// Random forest, JSON object dump.
    Sklearn,
    /// Random forest exported to an ONNX graph.
    Onnx,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::LightGbm,
        Backend::XgBoost,
        Backend::Sklearn,
        Backend::Onnx,
    ];

    /// Directory name under the layout root.
    pub fn name(self) -> &'static str {
        match self {
            Backend::LightGbm => "lightgbm",
            Backend::XgBoost => "xgboost",
            Backend::Sklearn => "sklearn",
            Backend::Onnx => "onnx",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Backend::LightGbm => "LightGBM",
            Backend::XgBoost => "XGBoost",
            Backend::Sklearn => "Sklearn",
            Backend::Onnx => "ONNX",
        }
    }

    /// Files written by training and checked afterwards, in check order.
    pub fn artifacts(self) -> &'static [Artifact] {
        match self {
            Backend::LightGbm => &[Artifact::Native, Artifact::Text],
            Backend::XgBoost => &[Artifact::Native],
            Backend::Sklearn => &[Artifact::Object],
            Backend::Onnx => &[Artifact::Onnx],
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Native binary boosted model.
    Native,
    /// LightGBM text boosted model.
    Text,
    /// JSON object dump of a random forest.
    Object,
    /// ONNX tree-ensemble graph.
    Onnx,
}

impl Artifact {
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Native => "model.bst",
            Artifact::Text => "model.txt",
            Artifact::Object => "model.joblib",
            Artifact::Onnx => "model.onnx",
        }
    }

    /// Reload predictions are bit-identical for every format except ONNX,
    /// whose runtime sums pre-divided class weights.
    pub fn is_bit_exact(self) -> bool {
        !matches!(self, Artifact::Onnx)
    }

    /// Load the file as a classifier.
    pub fn load(self, path: &Path) -> Result<Box<dyn Classifier>, HarnessError> {
        let model: Box<dyn Classifier> = match self {
            Artifact::Native => Box::new(GBDTModel::load_native(path)?),
            Artifact::Text => Box::new(load_text(path)?),
            Artifact::Object => Box::new(RandomForestModel::load_object(path)?),
            Artifact::Onnx => Box::new(OnnxSession::load(path)?),
        };
        Ok(model)
    }
}

// =============================================================================
// Presets
// =============================================================================

/// Leaf-wise boosting: 100 rounds at rate 0.05, up to 31 leaves, at least
/// 20 rows per leaf, no L2 penalty, starting from the log class priors.
pub fn lightgbm_preset() -> Result<GBDTConfig, ConfigError> {
    GBDTConfig::builder()
        .n_trees(100)
        .learning_rate(0.05)
        .boost_from_average(true)
        .tree(TreeParams::leaf_wise(31))
        .regularization(RegularizationParams {
            lambda: 0.0,
            min_child_weight: 1e-3,
            min_gain: 0.0,
            min_samples_leaf: 20,
        })
        .metric(EvalMetric::LogLoss)
        .seed(42)
        .verbosity(Verbosity::Debug)
        .build()
}

/// Depth-wise boosting: 100 rounds at eta 0.3, depth 3.
pub fn xgboost_preset() -> Result<GBDTConfig, ConfigError> {
    GBDTConfig::builder()
        .n_trees(100)
        .learning_rate(0.3)
        .tree(TreeParams::depth_wise(3))
        .regularization(RegularizationParams {
            lambda: 1.0,
            min_child_weight: 1.0,
            min_gain: 0.0,
            min_samples_leaf: 1,
        })
        .metric(EvalMetric::LogLoss)
        .seed(42)
        .verbosity(Verbosity::Debug)
        .build()
}

/// 100 bootstrapped Gini trees of unlimited depth, `sqrt` features per split.
pub fn random_forest_preset() -> Result<RandomForestConfig, ConfigError> {
    RandomForestConfig::builder()
        .n_trees(100)
        .min_samples_split(2)
        .min_samples_leaf(1)
        .max_features(MaxFeatures::Sqrt)
        .bootstrap(true)
        .seed(42)
        .verbosity(Verbosity::Info)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::GrowthStrategy;

    #[test]
    fn artifacts_per_backend() {
        assert_eq!(Backend::LightGbm.artifacts(), &[Artifact::Native, Artifact::Text]);
        assert_eq!(Backend::Onnx.artifacts(), &[Artifact::Onnx]);
        assert!(Backend::ALL.iter().all(|b| !b.artifacts().is_empty()));
        assert_eq!(Backend::XgBoost.to_string(), "xgboost");
    }

    #[test]
    fn presets_validate() {
        let lgb = lightgbm_preset().unwrap();
        assert_eq!(
            lgb.tree.growth_strategy,
            GrowthStrategy::LeafWise { max_leaves: 31, max_depth: None }
        );
        assert!(lgb.boost_from_average);
        assert_eq!(lgb.to_attributes()["num_leaves"], "31");

        let xgb = xgboost_preset().unwrap();
        assert_eq!(xgb.tree.growth_strategy, GrowthStrategy::DepthWise { max_depth: 3 });
        assert_eq!(xgb.learning_rate, 0.3);

        let rf = random_forest_preset().unwrap();
        assert_eq!(rf.n_trees, 100);
        assert_eq!(rf.max_depth, None);
    }
}
