//! High-level GBDT configuration with builder pattern.
//!
//! [`GBDTConfig`] composes the nested parameter groups from
//! [`params`](super::params) and uses `bon` for builder generation with
//! validation at build time.
//!
//! # Example
//!
//! ```
//! use iris_roundtrip::model::gbdt::{GBDTConfig, RegularizationParams, TreeParams};
//!
//! // All defaults
//! let config = GBDTConfig::builder().build().unwrap();
//!
//! // LightGBM-like leaf-wise boosting
//! let config = GBDTConfig::builder()
//!     .learning_rate(0.05)
//!     .tree(TreeParams::leaf_wise(31))
//!     .regularization(RegularizationParams { lambda: 0.0, ..Default::default() })
//!     .boost_from_average(true)
//!     .build()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;

use bon::Builder;
use thiserror::Error;

use super::{ParamValidationError, RegularizationParams, SamplingParams, TreeParams};
use crate::training::gbdt::{GBDTParams, GainParams, GrowthStrategy};
use crate::training::Verbosity;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Learning rate must be positive.
    #[error("learning_rate must be positive, got {0}")]
    InvalidLearningRate(f32),
    /// Number of trees must be at least 1.
    #[error("n_trees must be at least 1")]
    InvalidNTrees,
    /// Invalid sampling ratio (must be in (0, 1]).
    #[error("{field} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { field: &'static str, value: f32 },
    /// Invalid regularization parameter.
    #[error("{field} must be non-negative, got {value}")]
    InvalidRegularization { field: &'static str, value: f32 },
    #[error("invalid tree parameters: {0}")]
    InvalidTree(String),
    /// Random forest size limits (`max_depth`, `min_samples_*`).
    #[error("{field} must be at least {min}, got {value}")]
    InvalidLimit { field: &'static str, min: u32, value: u32 },
    #[error("max_features must select at least one feature")]
    InvalidMaxFeatures,
}

impl From<ParamValidationError> for ConfigError {
    fn from(e: ParamValidationError) -> Self {
        match e {
            ParamValidationError::InvalidLambda(v) => {
                ConfigError::InvalidRegularization { field: "lambda", value: v }
            }
            ParamValidationError::InvalidMinChildWeight(v) => {
                ConfigError::InvalidRegularization { field: "min_child_weight", value: v }
            }
            ParamValidationError::InvalidMinGain(v) => {
                ConfigError::InvalidRegularization { field: "min_gain", value: v }
            }
            ParamValidationError::InvalidSubsample(v) => {
                ConfigError::InvalidSamplingRatio { field: "subsample", value: v }
            }
            ParamValidationError::InvalidColsampleBytree(v) => {
                ConfigError::InvalidSamplingRatio { field: "colsample_bytree", value: v }
            }
            e @ ParamValidationError::InvalidMaxLeaves(_) => {
                ConfigError::InvalidTree(e.to_string())
            }
        }
    }
}

// =============================================================================
// EvalMetric
// =============================================================================

/// Metric reported for evaluation sets during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMetric {
    /// Multiclass cross-entropy.
    #[default]
    LogLoss,
    /// Fraction of correctly classified rows.
    Accuracy,
}

impl EvalMetric {
    pub fn name(self) -> &'static str {
        match self {
            EvalMetric::LogLoss => "multi_logloss",
            EvalMetric::Accuracy => "accuracy",
        }
    }
}

// =============================================================================
// GBDTConfig
// =============================================================================

/// High-level configuration for GBDT model training.
///
/// The objective is always softmax cross-entropy over the classes found in
/// the training labels.
///
/// # Structure
///
/// - **Boosting**: `n_trees`, `learning_rate`, `boost_from_average`
/// - **Tree**: Tree structure via [`TreeParams`]
/// - **Regularization**: Overfitting control via [`RegularizationParams`]
/// - **Sampling**: Data subsampling via [`SamplingParams`]
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct GBDTConfig {
    // === Boosting parameters ===
    /// Number of boosting rounds. Each round adds one tree per class. Default: 100.
    #[builder(default = 100)]
    pub n_trees: u32,

    /// Learning rate (shrinkage). Default: 0.3.
    #[builder(default = 0.3)]
    pub learning_rate: f32,

    /// Start from log class priors instead of zero scores. Default: false.
    #[builder(default = false)]
    pub boost_from_average: bool,

    // === Nested parameter groups ===
    /// Tree structure parameters.
    #[builder(default)]
    pub tree: TreeParams,

    /// Regularization parameters.
    #[builder(default)]
    pub regularization: RegularizationParams,

    /// Row and column sampling parameters.
    #[builder(default)]
    pub sampling: SamplingParams,

    /// Metric logged for evaluation sets. Default: log loss.
    #[builder(default)]
    pub metric: EvalMetric,

    // === Reproducibility ===
    /// Random seed. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    // === Logging ===
    /// Verbosity level. Default: `Warning`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: g_b_d_t_config_builder::IsComplete> GBDTConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is invalid:
    /// - `learning_rate <= 0` (or NaN)
    /// - `n_trees == 0`
    /// - Sampling ratios outside (0, 1]
    /// - Negative regularization parameters
    /// - Fewer than two leaves for leaf-wise growth
    pub fn build(self) -> Result<GBDTConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl GBDTConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        self.tree.validate()?;
        self.sampling.validate()?;
        self.regularization.validate()?;
        Ok(())
    }

    /// Convert to the low-level trainer parameters.
    pub fn to_trainer_params(&self) -> GBDTParams {
        GBDTParams {
            n_trees: self.n_trees,
            learning_rate: self.learning_rate,
            growth_strategy: self.tree.growth_strategy,
            gain: GainParams {
                reg_lambda: self.regularization.lambda,
                min_gain: self.regularization.min_gain,
                min_child_weight: self.regularization.min_child_weight,
                min_samples_leaf: self.regularization.min_samples_leaf,
            },
            row_sampling: self.sampling.row_sampling(),
            col_sampling: self.sampling.col_sampling(),
            verbosity: self.verbosity,
            seed: self.seed,
        }
    }

    /// Training hyperparameters as string attributes, stored with the model.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            attrs.insert(key.to_string(), value);
        };
        put("objective", "multiclass".to_string());
        put("num_iterations", self.n_trees.to_string());
        put("learning_rate", self.learning_rate.to_string());
        put("boost_from_average", self.boost_from_average.to_string());
        match self.tree.growth_strategy {
            GrowthStrategy::DepthWise { max_depth } => {
                put("grow_policy", "depthwise".to_string());
                put("max_depth", max_depth.to_string());
            }
            GrowthStrategy::LeafWise { max_leaves, max_depth } => {
                put("grow_policy", "lossguide".to_string());
                put("num_leaves", max_leaves.to_string());
                if let Some(d) = max_depth {
                    put("max_depth", d.to_string());
                }
            }
        }
        put("lambda_l2", self.regularization.lambda.to_string());
        put("min_sum_hessian_in_leaf", self.regularization.min_child_weight.to_string());
        put("min_gain_to_split", self.regularization.min_gain.to_string());
        put("min_data_in_leaf", self.regularization.min_samples_leaf.to_string());
        put("bagging_fraction", self.sampling.subsample.to_string());
        put("feature_fraction", self.sampling.colsample_bytree.to_string());
        put("metric", self.metric.name().to_string());
        put("seed", self.seed.to_string());
        attrs
    }
}

// =============================================================================
// Tests
// =============================================================================
