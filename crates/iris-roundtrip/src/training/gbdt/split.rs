//! Gain computation and exact greedy split finding.

use ndarray::ArrayView2;

use crate::training::gradients::GradsTuple;

// =============================================================================
// Gain Parameters
// =============================================================================

/// Parameters for split gain computation and leaf weight calculation.
///
/// These parameters are static for the lifetime of training and control
/// regularization and splitting constraints.
#[derive(Clone, Debug, PartialEq)]
pub struct GainParams {
    /// L2 regularization (lambda).
    pub reg_lambda: f32,
    /// Minimum split gain (gamma). A split must gain strictly more.
    pub min_gain: f32,
    /// Minimum sum of hessians per child.
    pub min_child_weight: f32,
    /// Minimum samples per child.
    pub min_samples_leaf: u32,
}

impl Default for GainParams {
    fn default() -> Self {
        Self {
            reg_lambda: 1.0,
            min_gain: 0.0,
            min_child_weight: 1.0,
            min_samples_leaf: 1,
        }
    }
}

impl GainParams {
    /// Split gain.
    ///
    /// ```text
    /// gain = 0.5 * [G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)]
    /// ```
    #[inline]
    pub fn compute_gain(
        &self,
        grad_left: f64,
        hess_left: f64,
        grad_right: f64,
        hess_right: f64,
        grad_parent: f64,
        hess_parent: f64,
    ) -> f64 {
        let lambda = self.reg_lambda as f64;

        let score_left = grad_left * grad_left / (hess_left + lambda);
        let score_right = grad_right * grad_right / (hess_right + lambda);
        let score_parent = grad_parent * grad_parent / (hess_parent + lambda);

        0.5 * (score_left + score_right - score_parent)
    }

    /// Check if a split satisfies minimum constraints.
    #[inline]
    pub fn is_valid_split(
        &self,
        hess_left: f64,
        hess_right: f64,
        count_left: u32,
        count_right: u32,
    ) -> bool {
        let min_weight = self.min_child_weight as f64;
        let min_samples = self.min_samples_leaf.max(1);

        hess_left >= min_weight
            && hess_right >= min_weight
            && count_left >= min_samples
            && count_right >= min_samples
    }

    /// Newton-step leaf weight, `-G / (H + λ)`.
    #[inline]
    pub fn compute_leaf_weight(&self, grad_sum: f64, hess_sum: f64) -> f32 {
        let denom = hess_sum + self.reg_lambda as f64;
        if denom <= 0.0 {
            return 0.0;
        }
        (-grad_sum / denom) as f32
    }
}

// =============================================================================
// Split search
// =============================================================================

/// Best split found for a node.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitInfo {
    pub feature: u32,
    /// Samples with `value <= threshold` go left.
    pub threshold: f32,
    /// Direction for missing values.
    pub default_left: bool,
    pub gain: f64,
}

/// Threshold strictly between two consecutive distinct values.
///
/// Falls back to `lo` when the midpoint rounds onto `hi`, so that
/// `lo <= t < hi` always holds.
#[inline]
pub fn midpoint_threshold(lo: f32, hi: f32) -> f32 {
    let mid = ((lo as f64 + hi as f64) * 0.5) as f32;
    if mid >= lo && mid < hi { mid } else { lo }
}

/// Exact greedy splitter: sorts node values per feature and scans every
/// boundary between distinct values.
#[derive(Clone, Debug)]
pub struct ExactSplitter {
    gain: GainParams,
}

struct Entry {
    value: f32,
    grad: f64,
    hess: f64,
}

impl ExactSplitter {
    pub fn new(gain: GainParams) -> Self {
        Self { gain }
    }

    pub fn gain_params(&self) -> &GainParams {
        &self.gain
    }

    /// Leaf weight for a node (before learning rate).
    pub fn compute_leaf_weight(&self, grad_sum: f64, hess_sum: f64) -> f32 {
        self.gain.compute_leaf_weight(grad_sum, hess_sum)
    }

    /// Find the best split of `rows` over `features_allowed`.
    ///
    /// Ties keep the first candidate in (feature, threshold) order, so the
    /// result is deterministic. Returns `None` when no split gains more than
    /// `min_gain` under the child constraints.
    pub fn find_split(
        &self,
        features: ArrayView2<'_, f32>,
        rows: &[u32],
        pairs: &[GradsTuple],
        features_allowed: &[u32],
        grad_sum: f64,
        hess_sum: f64,
    ) -> Option<SplitInfo> {
        let n_node = rows.len() as u32;
        let mut best: Option<SplitInfo> = None;
        let mut best_gain = self.gain.min_gain as f64;
        let mut entries: Vec<Entry> = Vec::with_capacity(rows.len());

        for &feature in features_allowed {
            entries.clear();
            let (mut miss_grad, mut miss_hess, mut miss_count) = (0.0f64, 0.0f64, 0u32);
            for &r in rows {
                let value = features[[r as usize, feature as usize]];
                let p = pairs[r as usize];
                if value.is_nan() {
                    miss_grad += p.grad as f64;
                    miss_hess += p.hess as f64;
                    miss_count += 1;
                } else {
                    entries.push(Entry { value, grad: p.grad as f64, hess: p.hess as f64 });
                }
            }
            if entries.len() < 2 {
                continue;
            }
            entries.sort_by(|a, b| a.value.total_cmp(&b.value));

            // Without missing values only the left default is tried.
            let directions: &[bool] = if miss_count > 0 { &[true, false] } else { &[true] };

            let (mut left_grad, mut left_hess) = (0.0f64, 0.0f64);
            for i in 0..entries.len() - 1 {
                left_grad += entries[i].grad;
                left_hess += entries[i].hess;
                let (lo, hi) = (entries[i].value, entries[i + 1].value);
                if lo >= hi {
                    continue;
                }
                let present_left = i as u32 + 1;

                for &default_left in directions {
                    let (gl, hl, cl) = if default_left {
                        (left_grad + miss_grad, left_hess + miss_hess, present_left + miss_count)
                    } else {
                        (left_grad, left_hess, present_left)
                    };
                    let (gr, hr, cr) = (grad_sum - gl, hess_sum - hl, n_node - cl);
                    if !self.gain.is_valid_split(hl, hr, cl, cr) {
                        continue;
                    }
                    let gain = self.gain.compute_gain(gl, hl, gr, hr, grad_sum, hess_sum);
                    if gain > best_gain {
                        best_gain = gain;
                        best = Some(SplitInfo {
                            feature,
                            threshold: midpoint_threshold(lo, hi),
                            default_left,
                            gain,
                        });
                    }
                }
            }
        }

        best
    }
}
