//! Training infrastructure.
//!
//! - [`gbdt`]: gradient boosting with exact greedy splits
//! - [`forest`]: bagged Gini trees
//! - [`objectives`], [`metrics`]: softmax loss, log loss and accuracy
//! - [`TrainingLogger`]: `tracing` events gated by [`Verbosity`]

pub mod eval;
pub mod forest;
pub mod gbdt;
pub mod gradients;
pub mod logger;
pub mod metrics;
pub mod objectives;
pub mod sampling;

use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;

pub use eval::{EvalSet, MetricValue};
pub use forest::{MaxFeatures, RandomForestParams, RandomForestTrainer};
pub use gbdt::{GBDTParams, GBDTTrainer, GainParams, GrowthStrategy};
pub use gradients::{Gradients, GradsTuple};
pub use logger::{TrainingLogger, Verbosity};
pub use metrics::{accuracy, MetricFn, MulticlassAccuracy, MulticlassLogLoss};
pub use objectives::{ObjectiveFn, SoftmaxLoss};
pub use sampling::{ColSamplingParams, RowSamplingParams};

/// Errors raised before or during training.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainError {
    #[error("training data is empty")]
    EmptyData,

    #[error("feature matrix has {rows} rows but {labels} labels were given")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("label {label} at row {row} is out of range for {n_classes} classes")]
    LabelOutOfRange { row: usize, label: u32, n_classes: usize },

    #[error("classification needs at least 2 classes, got {0}")]
    TooFewClasses(usize),

    #[error("eval set {name:?} has shape {rows}x{cols} with {labels} labels")]
    EvalSetShape { name: String, rows: usize, cols: usize, labels: usize },

    #[error("feature {feature} at row {row} is infinite")]
    NonFiniteFeature { row: usize, feature: usize },
}

/// Shared input checks for every trainer.
///
/// Missing values (NaN) are allowed; infinities are not.
pub(crate) fn validate_inputs(
    features: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, u32>,
    n_classes: usize,
) -> Result<(), TrainError> {
    let (n_rows, n_features) = features.dim();
    if n_rows == 0 || n_features == 0 {
        return Err(TrainError::EmptyData);
    }
    if labels.len() != n_rows {
        return Err(TrainError::LabelCountMismatch { rows: n_rows, labels: labels.len() });
    }
    if n_classes < 2 {
        return Err(TrainError::TooFewClasses(n_classes));
    }
    let out_of_range = labels.iter().enumerate().find(|&(_, &l)| l as usize >= n_classes);
    if let Some((row, &label)) = out_of_range {
        return Err(TrainError::LabelOutOfRange { row, label, n_classes });
    }
    if let Some(((row, feature), _)) = features.indexed_iter().find(|(_, v)| v.is_infinite()) {
        return Err(TrainError::NonFiniteFeature { row, feature });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn validate_inputs_reports_first_problem() {
        let x = array![[1.0f32, f32::NAN], [2.0, 3.0]];
        assert!(validate_inputs(x.view(), array![0u32, 1].view(), 2).is_ok());

        let empty = Array2::<f32>::zeros((0, 2));
        let no_labels = Array1::<u32>::zeros(0);
        assert_eq!(validate_inputs(empty.view(), no_labels.view(), 2), Err(TrainError::EmptyData));
        assert_eq!(
            validate_inputs(x.view(), array![0u32, 1].view(), 1),
            Err(TrainError::TooFewClasses(1))
        );

        let inf = array![[1.0f32, 2.0], [f32::INFINITY, 0.0]];
        assert_eq!(
            validate_inputs(inf.view(), array![0u32, 1].view(), 2),
            Err(TrainError::NonFiniteFeature { row: 1, feature: 0 })
        );
    }
}
