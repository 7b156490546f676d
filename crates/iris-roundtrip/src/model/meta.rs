//! Model metadata.
//!
//! Shared metadata types for model introspection.

use serde::{Deserialize, Serialize};

use crate::data::Dataset;

/// Type of machine learning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskKind {
    /// Regression (continuous target).
    #[default]
    Regression,
    /// Binary classification (one logit output).
    BinaryClassification,
    /// Multi-class classification (3+ classes).
    MulticlassClassification {
        /// Number of classes.
        n_classes: usize,
    },
}

impl TaskKind {
    /// Task for `n_classes` classes with one output per class.
    pub fn for_classes(n_classes: usize) -> Self {
        match n_classes {
            0 | 1 => Self::Regression,
            2 => Self::BinaryClassification,
            n => Self::MulticlassClassification { n_classes: n },
        }
    }

    /// Returns the number of output groups for this task.
    pub fn n_groups(&self) -> usize {
        match self {
            Self::Regression => 1,
            Self::BinaryClassification => 1,
            Self::MulticlassClassification { n_classes } => *n_classes,
        }
    }

    /// Number of classes, 0 for regression.
    pub fn n_classes(&self) -> usize {
        match self {
            Self::Regression => 0,
            Self::BinaryClassification => 2,
            Self::MulticlassClassification { n_classes } => *n_classes,
        }
    }

    /// Returns true if this is a classification task.
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            Self::BinaryClassification | Self::MulticlassClassification { .. }
        )
    }
}

/// Shared metadata for all model types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Number of features.
    pub n_features: usize,
    /// Task type.
    pub task: TaskKind,
    /// Feature names (optional).
    pub feature_names: Option<Vec<String>>,
    /// Class names, indexed by label (optional).
    pub class_names: Option<Vec<String>>,
    /// Per-feature `(min, max)` seen during training (optional).
    pub feature_ranges: Option<Vec<(f32, f32)>>,
}

impl ModelMeta {
    /// Create metadata for multi-class classification.
    ///
    /// Two classes are still stored as a multiclass task: both model
    /// families here produce one output per class.
    pub fn for_multiclass(n_features: usize, n_classes: usize) -> Self {
        Self {
            n_features,
            task: TaskKind::MulticlassClassification { n_classes },
            ..Default::default()
        }
    }

    /// Metadata describing a training dataset.
    ///
    /// Feature ranges are only kept when every feature has finite bounds.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let ranges = dataset.feature_ranges();
        let finite = ranges.iter().all(|(lo, hi)| lo.is_finite() && hi.is_finite());
        let meta = Self::for_multiclass(dataset.n_features(), dataset.n_classes())
            .with_feature_names(dataset.feature_names().to_vec())
            .with_class_names(dataset.class_names().to_vec());
        if finite { meta.with_feature_ranges(ranges) } else { meta }
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.task.n_classes()
    }

    /// Number of output groups.
    pub fn n_groups(&self) -> usize {
        self.task.n_groups()
    }

    /// Set feature names.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// Set class names.
    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = Some(names);
        self
    }

    /// Set feature ranges.
    pub fn with_feature_ranges(mut self, ranges: Vec<(f32, f32)>) -> Self {
        self.feature_ranges = Some(ranges);
        self
    }

    /// Check that optional per-feature and per-class lists have the right length.
    pub fn check_lengths(&self) -> Result<(), String> {
        let n_features = self.n_features;
        if let Some(names) = &self.feature_names {
            if names.len() != n_features {
                return Err(format!("{} feature names for {} features", names.len(), n_features));
            }
        }
        if let Some(ranges) = &self.feature_ranges {
            if ranges.len() != n_features {
                return Err(format!("{} feature ranges for {} features", ranges.len(), n_features));
            }
        }
        if let Some(names) = &self.class_names {
            if names.len() != self.n_classes() {
                return Err(format!("{} class names for {} classes", names.len(), self.n_classes()));
            }
        }
        Ok(())
    }
}
