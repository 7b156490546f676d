//! Objective (loss) functions.
//!
//! Only multiclass classification is trained here, so the one implementation
//! is [`SoftmaxLoss`]. The [`ObjectiveFn`] seam stays so the trainer does not
//! depend on the concrete loss.

use ndarray::{ArrayView1, ArrayView2, ArrayViewMut2};

use super::gradients::GradsTuple;

/// A differentiable training objective.
pub trait ObjectiveFn: Send + Sync {
    /// Number of outputs (raw scores) per sample.
    fn n_outputs(&self) -> usize;

    /// Compute gradients and hessians.
    ///
    /// `predictions` and `grad_hess` are column-major `[n_outputs, n_rows]`.
    fn compute_gradients_into(
        &self,
        predictions: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        grad_hess: ArrayViewMut2<'_, GradsTuple>,
    );

    /// Optimal constant raw score per output before any tree is added.
    fn compute_base_score(&self, labels: ArrayView1<'_, u32>) -> Vec<f32>;

    /// Turn one sample's raw scores into probabilities, in place.
    fn transform_row(&self, raw: &mut [f32]);

    /// Name of the objective (for logging and model attributes).
    fn name(&self) -> &'static str;
}

/// Numerically stable softmax, in place.
#[inline]
pub fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

/// Logistic sigmoid.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// =============================================================================
// Softmax Loss
// =============================================================================

/// Softmax cross-entropy loss for multiclass classification.
///
/// Labels are class indices `0..num_classes`.
#[derive(Debug, Clone, Copy)]
pub struct SoftmaxLoss {
    /// Number of classes.
    pub num_classes: usize,
    /// Start from log class priors instead of zero.
    pub boost_from_average: bool,
}

impl SoftmaxLoss {
    /// Create a new softmax loss for the given number of classes.
    pub fn new(num_classes: usize) -> Self {
        debug_assert!(num_classes >= 2, "num_classes must be >= 2");
        Self { num_classes, boost_from_average: false }
    }

    /// Initialize raw scores with log class priors.
    pub fn with_boost_from_average(mut self, enabled: bool) -> Self {
        self.boost_from_average = enabled;
        self
    }
}

impl ObjectiveFn for SoftmaxLoss {
    fn n_outputs(&self) -> usize {
        self.num_classes
    }

    fn compute_gradients_into(
        &self,
        predictions: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, u32>,
        mut grad_hess: ArrayViewMut2<'_, GradsTuple>,
    ) {
        let k = self.num_classes;
        let n_rows = labels.len();
        debug_assert_eq!(predictions.dim(), (k, n_rows));
        const HESS_MIN: f32 = 1e-6;

        let mut probs = vec![0.0f32; k];
        for (i, &label) in labels.iter().enumerate() {
            for c in 0..k {
                probs[c] = predictions[[c, i]];
            }
            softmax_in_place(&mut probs);

            for (c, &p) in probs.iter().enumerate() {
                let target = if c == label as usize { 1.0 } else { 0.0 };
                grad_hess[[c, i]] = GradsTuple {
                    grad: p - target,
                    hess: (p * (1.0 - p)).max(HESS_MIN),
                };
            }
        }
    }

    fn compute_base_score(&self, labels: ArrayView1<'_, u32>) -> Vec<f32> {
        let k = self.num_classes;
        if !self.boost_from_average || labels.is_empty() {
            return vec![0.0; k];
        }

        let mut counts = vec![0.0f64; k];
        for &label in labels.iter() {
            if (label as usize) < k {
                counts[label as usize] += 1.0;
            }
        }
        let total = labels.len() as f64;
        counts
            .iter()
            .map(|&c| (c / total).clamp(1e-7, 1.0 - 1e-7).ln() as f32)
            .collect()
    }

    fn transform_row(&self, raw: &mut [f32]) {
        softmax_in_place(raw);
    }

    fn name(&self) -> &'static str {
        "multiclass"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn softmax_sums_to_one() {
        let mut v = [1.0f32, 2.0, 3.0];
        softmax_in_place(&mut v);
        assert_abs_diff_eq!(v.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(v[2] > v[1] && v[1] > v[0]);

        let mut big = [1000.0f32, 1000.0];
        softmax_in_place(&mut big);
        assert_eq!(big, [0.5, 0.5]);
    }

    #[test]
    fn softmax_gradients_sign() {
        let obj = SoftmaxLoss::new(3);
        // [n_outputs, n_rows]: sample 0 favours class 0, sample 1 favours class 1
        let preds = array![[1.0f32, 0.0], [0.0, 1.0], [0.0, 0.0]];
        let labels = array![0u32, 1];
        let mut gh = Array2::from_elem((3, 2), GradsTuple::default());

        obj.compute_gradients_into(preds.view(), labels.view(), gh.view_mut());

        assert!(gh[[0, 0]].grad < 0.0);
        assert!(gh[[2, 0]].grad > 0.0);
        assert!(gh[[1, 1]].grad < 0.0);
        assert!(gh.iter().all(|p| p.hess > 0.0));
        // Gradients over classes sum to zero per sample.
        let grad_sum = gh[[0, 0]].grad + gh[[1, 0]].grad + gh[[2, 0]].grad;
        assert_abs_diff_eq!(grad_sum, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn base_score_uses_log_priors_when_enabled() {
        let labels = array![0u32, 0, 1, 2];
        let plain = SoftmaxLoss::new(3).compute_base_score(labels.view());
        assert_eq!(plain, vec![0.0; 3]);

        let avg = SoftmaxLoss::new(3)
            .with_boost_from_average(true)
            .compute_base_score(labels.view());
        assert_abs_diff_eq!(avg[0], 0.5f32.ln(), epsilon = 1e-6);
        assert_abs_diff_eq!(avg[1], 0.25f32.ln(), epsilon = 1e-6);
        assert_eq!(avg[1], avg[2]);
    }

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
    }
}
