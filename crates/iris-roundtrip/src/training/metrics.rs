//! Evaluation metrics for multiclass classification.

use ndarray::{ArrayView1, ArrayView2};

/// A metric evaluated on class probabilities.
pub trait MetricFn: Send + Sync {
    /// Compute the metric.
    ///
    /// `probabilities` are column-major `[n_classes, n_rows]`.
    fn compute(&self, probabilities: ArrayView2<'_, f32>, labels: ArrayView1<'_, u32>) -> f64;

    /// Whether higher values indicate better performance.
    fn higher_is_better(&self) -> bool;

    /// Name of the metric (for logging).
    fn name(&self) -> &'static str;
}

// =============================================================================
// Multiclass Log Loss
// =============================================================================

/// Mean negative log-likelihood of the true class.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticlassLogLoss;

impl MetricFn for MulticlassLogLoss {
    fn compute(&self, probabilities: ArrayView2<'_, f32>, labels: ArrayView1<'_, u32>) -> f64 {
        let (n_classes, n_rows) = probabilities.dim();
        if n_rows == 0 || n_classes == 0 {
            return 0.0;
        }

        const EPS: f64 = 1e-15;

        let sum_loss: f64 = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let class_idx = (label as usize).min(n_classes - 1);
                let prob = (probabilities[[class_idx, i]] as f64).clamp(EPS, 1.0 - EPS);
                -prob.ln()
            })
            .sum();

        sum_loss / n_rows as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "multi_logloss"
    }
}

// =============================================================================
// Multiclass Accuracy
// =============================================================================

/// Fraction of rows whose arg-max class equals the label.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticlassAccuracy;

impl MetricFn for MulticlassAccuracy {
    fn compute(&self, probabilities: ArrayView2<'_, f32>, labels: ArrayView1<'_, u32>) -> f64 {
        let n_rows = probabilities.ncols();
        if n_rows == 0 {
            return 0.0;
        }
        let correct = labels
            .iter()
            .enumerate()
            .filter(|&(i, &label)| {
                let column = probabilities.column(i).to_vec();
                crate::utils::argmax(&column) == label as usize
            })
            .count();
        correct as f64 / n_rows as f64
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "multi_accuracy"
    }
}

/// Accuracy of predicted labels against true labels.
///
/// Returns 0 for empty input.
pub fn accuracy(predicted: ArrayView1<'_, u32>, labels: ArrayView1<'_, u32>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(labels.iter()).filter(|(p, l)| p == l).count();
    correct as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn logloss_perfect_and_uniform() {
        let perfect = array![[1.0f32, 0.0], [0.0, 1.0]];
        let labels = array![0u32, 1];
        assert!(MulticlassLogLoss.compute(perfect.view(), labels.view()) < 1e-10);

        let third = 1.0f32 / 3.0;
        let uniform = array![[third, third, third], [third, third, third], [third, third, third]];
        let labels = array![0u32, 1, 2];
        assert_abs_diff_eq!(
            MulticlassLogLoss.compute(uniform.view(), labels.view()),
            3.0f64.ln(),
            epsilon = 1e-6
        );
        assert!(!MulticlassLogLoss.higher_is_better());
    }

    #[test]
    fn accuracy_from_probabilities() {
        let probs = array![[0.7f32, 0.2, 0.1], [0.2, 0.5, 0.1], [0.1, 0.3, 0.8]];
        let labels = array![0u32, 1, 1];
        assert_abs_diff_eq!(MulticlassAccuracy.compute(probs.view(), labels.view()), 2.0 / 3.0);
        assert!(MulticlassAccuracy.higher_is_better());
    }

    #[test]
    fn accuracy_from_labels() {
        assert_eq!(accuracy(array![1u32, 1, 0].view(), array![1u32, 0, 0].view()), 2.0 / 3.0);
        assert_eq!(accuracy(array![].view(), array![].view()), 0.0);
    }
}
