//! Gradient/hessian buffer with column-major (output-major) layout.
//!
//! For `n_samples` samples and `n_outputs` outputs the pairs are stored as an
//! `[n_outputs, n_samples]` array, so one output's pairs form a contiguous
//! slice that the tree grower reads directly.

use ndarray::{Array2, ArrayViewMut2};

/// One (gradient, hessian) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradsTuple {
    pub grad: f32,
    pub hess: f32,
}

/// Gradient buffer for all samples and outputs.
#[derive(Debug, Clone)]
pub struct Gradients {
    pairs: Array2<GradsTuple>,
}

impl Gradients {
    /// Create a zeroed buffer.
    pub fn new(n_samples: usize, n_outputs: usize) -> Self {
        Self { pairs: Array2::from_elem((n_outputs, n_samples), GradsTuple::default()) }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.pairs.ncols()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.pairs.nrows()
    }

    /// Mutable view of all pairs, shape `[n_outputs, n_samples]`.
    pub fn pairs_array_mut(&mut self) -> ArrayViewMut2<'_, GradsTuple> {
        self.pairs.view_mut()
    }

    /// Contiguous pairs for one output.
    pub fn output_pairs(&self, output: usize) -> &[GradsTuple] {
        // Standard layout guarantees contiguous rows.
        let start = output * self.n_samples();
        &self.pairs.as_slice().unwrap_or(&[])[start..start + self.n_samples()]
    }

    /// Gradient and hessian sums for one output over `rows` (all rows if `None`).
    ///
    /// Accumulates in f64.
    pub fn sum(&self, output: usize, rows: Option<&[u32]>) -> (f64, f64) {
        let pairs = self.output_pairs(output);
        let add = |(g, h): (f64, f64), p: &GradsTuple| (g + p.grad as f64, h + p.hess as f64);
        match rows {
            Some(rows) => rows.iter().map(|&r| &pairs[r as usize]).fold((0.0, 0.0), add),
            None => pairs.iter().fold((0.0, 0.0), add),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_slices_are_column_major() {
        let mut g = Gradients::new(3, 2);
        {
            let mut view = g.pairs_array_mut();
            view[[1, 2]] = GradsTuple { grad: -0.5, hess: 0.25 };
            view[[0, 0]] = GradsTuple { grad: 1.0, hess: 1.0 };
        }
        assert_eq!(g.output_pairs(1)[2].grad, -0.5);
        assert_eq!(g.output_pairs(0)[0].hess, 1.0);
        assert_eq!(g.n_samples(), 3);
        assert_eq!(g.n_outputs(), 2);
    }

    #[test]
    fn sums_over_subsets() {
        let mut g = Gradients::new(4, 1);
        for (i, p) in g.pairs_array_mut().iter_mut().enumerate() {
            *p = GradsTuple { grad: i as f32, hess: 1.0 };
        }
        assert_eq!(g.sum(0, None), (6.0, 4.0));
        assert_eq!(g.sum(0, Some(&[1, 3])), (4.0, 2.0));
    }
}
