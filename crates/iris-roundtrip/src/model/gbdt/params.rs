//! Nested parameter groups for GBDT configuration.
//!
//! - [`TreeParams`]: Tree structure (growth strategy and its limits)
//! - [`RegularizationParams`]: L2 regularization and split constraints
//! - [`SamplingParams`]: Row and column subsampling rates

use crate::training::gbdt::GrowthStrategy;
use crate::training::sampling::{ColSamplingParams, RowSamplingParams};

// =============================================================================
// TreeParams
// =============================================================================

/// Tree structure parameters.
///
/// ```
/// use iris_roundtrip::model::gbdt::TreeParams;
///
/// // Depth-limited trees (XGBoost style)
/// let params = TreeParams::depth_wise(3);
///
/// // Leaf-limited trees (LightGBM style)
/// let params = TreeParams::leaf_wise(31);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeParams {
    /// Tree growth strategy (depth-wise or leaf-wise with size limits).
    pub growth_strategy: GrowthStrategy,
}

impl TreeParams {
    /// Create depth-wise growth with specified max depth.
    pub fn depth_wise(max_depth: u32) -> Self {
        Self { growth_strategy: GrowthStrategy::DepthWise { max_depth } }
    }

    /// Create leaf-wise growth with specified max leaves and no depth limit.
    pub fn leaf_wise(max_leaves: u32) -> Self {
        Self { growth_strategy: GrowthStrategy::LeafWise { max_leaves, max_depth: None } }
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.growth_strategy.max_depth()
    }

    /// Get the maximum leaves (if using leaf-wise growth).
    pub fn max_leaves(&self) -> Option<u32> {
        match self.growth_strategy {
            GrowthStrategy::DepthWise { .. } => None,
            GrowthStrategy::LeafWise { max_leaves, .. } => Some(max_leaves),
        }
    }

    pub fn validate(&self) -> Result<(), ParamValidationError> {
        match self.growth_strategy {
            GrowthStrategy::LeafWise { max_leaves, .. } if max_leaves < 2 => {
                Err(ParamValidationError::InvalidMaxLeaves(max_leaves))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// RegularizationParams
// =============================================================================

/// Regularization parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularizationParams {
    /// L2 regularization term on leaf weights. Default: 1.0.
    pub lambda: f32,

    /// Minimum sum of hessians required in a leaf. Default: 1.0.
    pub min_child_weight: f32,

    /// Minimum gain required to make a split. Default: 0.0.
    pub min_gain: f32,

    /// Minimum number of samples required in a leaf. Default: 1.
    pub min_samples_leaf: u32,
}

impl Default for RegularizationParams {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            min_child_weight: 1.0,
            min_gain: 0.0,
            min_samples_leaf: 1,
        }
    }
}

impl RegularizationParams {
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.lambda >= 0.0) {
            return Err(ParamValidationError::InvalidLambda(self.lambda));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(ParamValidationError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.min_gain >= 0.0) {
            return Err(ParamValidationError::InvalidMinGain(self.min_gain));
        }
        Ok(())
    }
}

// =============================================================================
// SamplingParams
// =============================================================================

/// Sampling parameters.
///
/// All rates are in the range (0, 1]. A rate of 1.0 means no sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Row subsampling ratio per tree. Default: 1.0 (no sampling).
    pub subsample: f32,

    /// Column subsampling ratio per tree. Default: 1.0 (no sampling).
    pub colsample_bytree: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { subsample: 1.0, colsample_bytree: 1.0 }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ParamValidationError::InvalidSubsample(self.subsample));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(ParamValidationError::InvalidColsampleBytree(self.colsample_bytree));
        }
        Ok(())
    }

    pub fn row_sampling(&self) -> RowSamplingParams {
        if self.subsample < 1.0 {
            RowSamplingParams::Uniform { fraction: self.subsample }
        } else {
            RowSamplingParams::None
        }
    }

    pub fn col_sampling(&self) -> ColSamplingParams {
        if self.colsample_bytree < 1.0 {
            ColSamplingParams::PerTree { fraction: self.colsample_bytree }
        } else {
            ColSamplingParams::None
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Parameter validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamValidationError {
    #[error("lambda must be >= 0, got {0}")]
    InvalidLambda(f32),

    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f32),

    #[error("min_gain must be >= 0, got {0}")]
    InvalidMinGain(f32),

    #[error("subsample must be in (0, 1], got {0}")]
    InvalidSubsample(f32),

    #[error("colsample_bytree must be in (0, 1], got {0}")]
    InvalidColsampleBytree(f32),

    #[error("max_leaves must be >= 2, got {0}")]
    InvalidMaxLeaves(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_params_default() {
        let params = TreeParams::default();
        assert!(matches!(params.growth_strategy, GrowthStrategy::DepthWise { max_depth: 6 }));
    }

    #[test]
    fn tree_params_leaf_wise() {
        let params = TreeParams::leaf_wise(31);
        assert_eq!(params.max_depth(), None);
        assert_eq!(params.max_leaves(), Some(31));
        assert!(TreeParams::leaf_wise(1).validate().is_err());
    }

    #[test]
    fn sampling_maps_to_trainer_params() {
        let params = SamplingParams { subsample: 0.5, ..Default::default() };
        assert_eq!(params.row_sampling(), RowSamplingParams::Uniform { fraction: 0.5 });
        assert_eq!(params.col_sampling(), ColSamplingParams::None);
        assert!(SamplingParams { subsample: 0.0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn regularization_rejects_negative_and_nan() {
        assert!(RegularizationParams { lambda: -1.0, ..Default::default() }.validate().is_err());
        let nan_gain = RegularizationParams { min_gain: f32::NAN, ..Default::default() };
        assert!(nan_gain.validate().is_err());
    }
}
