//! The capability every reloadable model shares: class probabilities and labels.

use ndarray::{Array1, Array2, ArrayView2};
use thiserror::Error;

use crate::utils::argmax;

/// Errors raised while predicting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictError {
    #[error("model expects {expected} features, input has {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("model is not a classifier")]
    NotAClassifier,

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A fitted multiclass classifier.
///
/// Implemented by the boosted and bagged tree models and by the ONNX
/// session, so callers can verify any of them the same way.
pub trait Classifier {
    /// Number of classes.
    fn n_classes(&self) -> usize;

    /// Number of input features.
    fn n_features(&self) -> usize;

    /// Class probabilities, shape `[n_rows, n_classes]`.
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError>;

    /// Arg-max class per row; ties go to the lowest class index.
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<u32>, PredictError> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(values) => argmax(values) as u32,
                None => argmax(&row.to_vec()) as u32,
            })
            .collect())
    }
}

/// Reject inputs whose column count differs from the model's.
pub(crate) fn check_features(
    features: ArrayView2<'_, f32>,
    expected: usize,
) -> Result<(), PredictError> {
    if features.ncols() != expected {
        return Err(PredictError::FeatureCountMismatch { expected, actual: features.ncols() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Fixed(Array2<f32>);

    impl Classifier for Fixed {
        fn n_classes(&self) -> usize {
            self.0.ncols()
        }

        fn n_features(&self) -> usize {
            1
        }

        fn predict_proba(
            &self,
            features: ArrayView2<'_, f32>,
        ) -> Result<Array2<f32>, PredictError> {
            check_features(features, 1)?;
            Ok(self.0.clone())
        }
    }

    #[test]
    fn predict_takes_argmax_with_low_index_ties() {
        let model = Fixed(array![[0.2f32, 0.5, 0.3], [0.4, 0.4, 0.2]]);
        let x = array![[0.0f32], [1.0]];
        assert_eq!(model.predict(x.view()).unwrap().to_vec(), vec![1, 0]);
    }

    #[test]
    fn feature_count_is_checked() {
        let model = Fixed(array![[1.0f32, 0.0]]);
        let x = array![[0.0f32, 1.0]];
        assert_eq!(
            model.predict(x.view()),
            Err(PredictError::FeatureCountMismatch { expected: 1, actual: 2 })
        );
    }
}
