//! Random forest configuration.

use std::collections::BTreeMap;

use bon::Builder;

use crate::model::ConfigError;
use crate::training::{MaxFeatures, RandomForestParams, Verbosity};
use crate::utils::Parallelism;

/// Configuration for random forest training.
///
/// ```
/// use iris_roundtrip::model::forest::RandomForestConfig;
/// use iris_roundtrip::training::MaxFeatures;
///
/// let config = RandomForestConfig::builder()
///     .n_trees(50)
///     .max_depth(8)
///     .max_features(MaxFeatures::All)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct RandomForestConfig {
    /// Number of trees. Default: 100.
    #[builder(default = 100)]
    pub n_trees: u32,

    /// Depth limit. `None` (the default) grows until leaves are pure.
    pub max_depth: Option<u32>,

    /// Minimum samples needed to split a node. Default: 2.
    #[builder(default = 2)]
    pub min_samples_split: u32,

    /// Minimum samples in each child. Default: 1.
    #[builder(default = 1)]
    pub min_samples_leaf: u32,

    /// Features examined per node. Default: `sqrt(n_features)`.
    #[builder(default)]
    pub max_features: MaxFeatures,

    /// Bootstrap rows per tree. Default: true.
    #[builder(default = true)]
    pub bootstrap: bool,

    /// Random seed; tree `i` uses `seed + i`. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Thread count: 0 = auto, 1 = sequential. Results do not depend on it.
    #[builder(default = 0)]
    pub n_threads: usize,

    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: random_forest_config_builder::IsComplete> RandomForestConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero trees, a zero depth limit,
    /// `min_samples_split < 2`, `min_samples_leaf < 1`, or an explicit
    /// feature count of zero.
    pub fn build(self) -> Result<RandomForestConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl RandomForestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        if let Some(depth) = self.max_depth {
            if depth == 0 {
                return Err(ConfigError::InvalidLimit { field: "max_depth", min: 1, value: depth });
            }
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::InvalidLimit {
                field: "min_samples_split",
                min: 2,
                value: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ConfigError::InvalidLimit {
                field: "min_samples_leaf",
                min: 1,
                value: self.min_samples_leaf,
            });
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(ConfigError::InvalidMaxFeatures);
        }
        Ok(())
    }

    pub fn to_trainer_params(&self) -> RandomForestParams {
        RandomForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            bootstrap: self.bootstrap,
            seed: self.seed,
            parallelism: Parallelism::from_threads(self.n_threads),
            verbosity: self.verbosity,
        }
    }

    /// Hyperparameters as string attributes, stored with the model.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let max_features = match self.max_features {
            MaxFeatures::Sqrt => "sqrt".to_string(),
            MaxFeatures::Log2 => "log2".to_string(),
            MaxFeatures::All => "all".to_string(),
            MaxFeatures::Count(k) => k.to_string(),
        };
        let max_depth = self.max_depth.map_or_else(|| "none".to_string(), |d| d.to_string());
        [
            ("criterion", "gini".to_string()),
            ("n_estimators", self.n_trees.to_string()),
            ("max_depth", max_depth),
            ("min_samples_split", self.min_samples_split.to_string()),
            ("min_samples_leaf", self.min_samples_leaf.to_string()),
            ("max_features", max_features),
            ("bootstrap", self.bootstrap.to_string()),
            ("random_state", self.seed.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bagged_gini_preset() {
        let config = RandomForestConfig::builder().build().unwrap();
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.max_features, MaxFeatures::Sqrt);
        assert!(config.bootstrap);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn rejects_invalid_limits() {
        assert!(matches!(
            RandomForestConfig::builder().n_trees(0).build(),
            Err(ConfigError::InvalidNTrees)
        ));
        assert!(matches!(
            RandomForestConfig::builder().max_depth(0).build(),
            Err(ConfigError::InvalidLimit { field: "max_depth", .. })
        ));
        assert!(matches!(
            RandomForestConfig::builder().min_samples_split(1).build(),
            Err(ConfigError::InvalidLimit { field: "min_samples_split", .. })
        ));
        assert!(matches!(
            RandomForestConfig::builder().max_features(MaxFeatures::Count(0)).build(),
            Err(ConfigError::InvalidMaxFeatures)
        ));
    }

    #[test]
    fn single_thread_is_sequential() {
        let config = RandomForestConfig::builder().n_threads(1).build().unwrap();
        assert_eq!(config.to_trainer_params().parallelism, Parallelism::Sequential);
        assert_eq!(config.to_attributes()["max_depth"], "none");
    }
}
