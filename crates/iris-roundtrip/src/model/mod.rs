//! High-level models: training entry points, prediction and metadata.
//!
//! - [`gbdt`]: gradient boosted trees ([`GBDTModel`], [`GBDTConfig`])
//! - [`forest`]: random forests ([`RandomForestModel`], [`RandomForestConfig`])
//! - [`Classifier`]: the prediction capability shared with the ONNX runtime

pub mod classifier;
pub mod forest;
pub mod gbdt;
pub mod importance;
pub mod meta;

use thiserror::Error;

use crate::repr::ForestValidationError;

pub use classifier::{Classifier, PredictError};
pub use forest::{RandomForestConfig, RandomForestModel};
pub use gbdt::{ConfigError, GBDTConfig, GBDTModel};
pub use importance::{ExplainError, FeatureImportance, ImportanceType};
pub use meta::{ModelMeta, TaskKind};

/// Errors when assembling a model from loaded parts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error(transparent)]
    Forest(#[from] ForestValidationError),

    #[error("forest has {forest} output groups, task needs {task}")]
    GroupMismatch { forest: usize, task: usize },

    #[error("invalid metadata: {0}")]
    Meta(String),
}
