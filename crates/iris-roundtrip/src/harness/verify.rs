//! Reload checks: a reloaded model must predict what the original did.

use ndarray::{Array1, ArrayView2};

use super::error::{HarnessError, ValidationFailure};
use crate::model::Classifier;

/// Check `reloaded` against `original` on `features`.
///
/// Labels must be identical. With `bit_exact`, class probabilities must also
/// be identical bit for bit. Returns the reloaded model's labels.
pub fn verify_reload<A, B>(
    format: &str,
    original: &A,
    reloaded: &B,
    features: ArrayView2<'_, f32>,
    bit_exact: bool,
) -> Result<Array1<u32>, HarnessError>
where
    A: Classifier + ?Sized,
    B: Classifier + ?Sized,
{
    let before = original.predict(features)?;
    let after = reloaded.predict(features)?;
    if before != after {
        return Err(ValidationFailure::LabelMismatch {
            format: format.to_string(),
            original: before.to_vec(),
            reloaded: after.to_vec(),
        }
        .into());
    }

    if bit_exact {
        let p_before = original.predict_proba(features)?;
        let p_after = reloaded.predict_proba(features)?;
        let identical = p_before.dim() == p_after.dim()
            && p_before.iter().zip(p_after.iter()).all(|(a, b)| a.to_bits() == b.to_bits());
        if !identical {
            let max_diff = if p_before.dim() == p_after.dim() {
                p_before
                    .iter()
                    .zip(p_after.iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0f32, f32::max)
            } else {
                f32::INFINITY
            };
            return Err(ValidationFailure::ProbabilityMismatch {
                format: format.to_string(),
                max_diff,
            }
            .into());
        }
    }
    tracing::debug!(format, rows = features.nrows(), bit_exact, "reload verified");
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PredictError;
    use ndarray::{array, Array2};

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
            _features: ArrayView2<'_, f32>,
        ) -> Result<Array2<f32>, PredictError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn identical_models_pass() {
        let a = Fixed(array![[0.2, 0.8], [0.6, 0.4]]);
        let x = array![[0.0f32], [1.0]];
        assert_eq!(verify_reload("copy", &a, &a, x.view(), true).unwrap(), array![1, 0]);
    }

    #[test]
    fn probability_drift_fails_only_when_exact() {
        let a = Fixed(array![[0.2, 0.8]]);
        let b = Fixed(array![[0.2000001, 0.7999999]]);
        let x = array![[0.0f32]];
        assert!(verify_reload("onnx", &a, &b, x.view(), false).is_ok());
        let err = verify_reload("model.txt", &a, &b, x.view(), true).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Validation(ValidationFailure::ProbabilityMismatch { .. })
        ));
    }

    #[test]
    fn label_change_fails() {
        let a = Fixed(array![[0.2, 0.8]]);
        let b = Fixed(array![[0.9, 0.1]]);
        let x = array![[0.0f32]];
        let err = verify_reload("model.bst", &a, &b, x.view(), false).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
