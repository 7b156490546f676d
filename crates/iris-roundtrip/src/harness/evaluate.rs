//! Accuracy on the train/test split and the reference fixture check.

use ndarray::Array1;

use super::error::ValidationFailure;
use crate::data::{Dataset, TrainTestSplit};
use crate::fixture::ReferenceFixture;
use crate::model::{Classifier, PredictError};
use crate::training::accuracy;

/// Both split accuracies must be strictly above this.
pub const MIN_ACCURACY: f64 = 0.8;

/// Accuracy on each side of the split, with the row counts it was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
}

impl Evaluation {
    pub fn check_bound(&self, bound: f64) -> Result<(), ValidationFailure> {
        for (split, accuracy) in [("train", self.train_accuracy), ("test", self.test_accuracy)] {
            if !(accuracy > bound) {
                return Err(ValidationFailure::AccuracyBelowBound { split, accuracy, bound });
            }
        }
        Ok(())
    }
}

pub fn dataset_accuracy<C: Classifier + ?Sized>(
    model: &C,
    dataset: &Dataset,
) -> Result<f64, PredictError> {
    let predicted = model.predict(dataset.features())?;
    Ok(accuracy(predicted.view(), dataset.labels()))
}

pub fn evaluate<C: Classifier + ?Sized>(
    model: &C,
    split: &TrainTestSplit,
) -> Result<Evaluation, PredictError> {
    Ok(Evaluation {
        train_rows: split.train.n_samples(),
        test_rows: split.test.n_samples(),
        train_accuracy: dataset_accuracy(model, &split.train)?,
        test_accuracy: dataset_accuracy(model, &split.test)?,
    })
}

/// Compare fixture predictions with the expected labels.
pub fn check_fixture(
    context: &str,
    predicted: &Array1<u32>,
    fixture: &ReferenceFixture,
) -> Result<(), ValidationFailure> {
    if fixture.matches(predicted.view()) {
        return Ok(());
    }
    Err(ValidationFailure::FixtureMismatch {
        context: context.to_string(),
        expected: fixture.expected().to_vec(),
        predicted: predicted.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn bound_is_strict() {
        let eval = Evaluation { train_accuracy: 0.95, test_accuracy: 0.8, ..Default::default() };
        assert_eq!(
            eval.check_bound(MIN_ACCURACY),
            Err(ValidationFailure::AccuracyBelowBound { split: "test", accuracy: 0.8, bound: 0.8 })
        );
        let eval = Evaluation { train_accuracy: 1.0, test_accuracy: 0.9, ..Default::default() };
        assert!(eval.check_bound(MIN_ACCURACY).is_ok());
        let nan = Evaluation {
            train_accuracy: f64::NAN,
            test_accuracy: 1.0,
            ..Default::default()
        };
        assert!(nan.check_bound(MIN_ACCURACY).is_err());
    }

    #[test]
    fn evaluation_records_split_sizes() {
        let split = crate::data::load_iris_split().unwrap();
        let model = crate::model::RandomForestModel::train(
            &split.train,
            &crate::harness::random_forest_preset().unwrap(),
        )
        .unwrap();
        let eval = evaluate(&model, &split).unwrap();
        assert_eq!((eval.train_rows, eval.test_rows), (120, 30));
        let correct = eval.test_accuracy * 30.0;
        approx::assert_abs_diff_eq!(correct, correct.round(), epsilon = 1e-9);
    }

    #[test]
    fn fixture_mismatch_reports_labels() {
        let fixture = ReferenceFixture::iris();
        assert!(check_fixture("model", &array![1, 1], &fixture).is_ok());
        let err = check_fixture("model.txt", &array![1, 2], &fixture).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::FixtureMismatch {
                context: "model.txt".into(),
                expected: vec![1, 1],
                predicted: vec![1, 2],
            }
        );
    }
}
