//! Small shared utilities.

use ndarray::ArrayView2;
use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// Components that can fan out (random-forest growth, batch prediction) take
/// this flag and use `rayon` only when it is [`Parallelism::Parallel`]. The
/// global rayon pool is used; no component builds its own pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    Sequential,
    #[default]
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map over `0..n` and collect in index order.
    ///
    /// Output order never depends on scheduling, so results are identical
    /// for both variants.
    pub fn maybe_par_map<T, F>(self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if self.is_parallel() {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }
}

// =============================================================================
// Row-major feature buffer
// =============================================================================

/// Dense row-major copy of a feature matrix.
///
/// Tree traversal takes `&[f32]` rows; this gives contiguous rows whatever
/// the layout of the source view.
#[derive(Debug, Clone)]
pub struct RowMatrix {
    data: Vec<f32>,
    n_rows: usize,
    n_cols: usize,
}

impl RowMatrix {
    pub fn from_view(view: ArrayView2<'_, f32>) -> Self {
        let (n_rows, n_cols) = view.dim();
        // `iter` visits elements in logical row-major order.
        let data = view.iter().copied().collect();
        Self { data, n_rows, n_cols }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.n_cols..(r + 1) * self.n_cols]
    }
}

/// Index of the largest value; ties resolve to the lowest index.
///
/// NaN entries never win. Returns 0 for an empty slice.
#[inline]
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[f32::NAN, 0.1]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn par_map_keeps_order() {
        let seq = Parallelism::Sequential.maybe_par_map(64, |i| i * i);
        let par = Parallelism::Parallel.maybe_par_map(64, |i| i * i);
        assert_eq!(seq, par);
        assert_eq!(seq[7], 49);
    }

    #[test]
    fn row_matrix_handles_transposed_views() {
        let a = ndarray::array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let t = a.t();
        let m = RowMatrix::from_view(t);
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.n_cols(), 3);
        assert_eq!(m.row(1), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn from_threads_one_is_sequential() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_threads(4), Parallelism::Parallel);
    }
}
