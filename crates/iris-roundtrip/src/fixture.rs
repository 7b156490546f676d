//! The reference rows every command checks.

use ndarray::{array, Array1, Array2, ArrayView1, ArrayView2};

/// Two versicolor-like measurements.
pub const REFERENCE_ROWS: [[f32; 4]; 2] = [[6.8, 2.8, 4.8, 1.4], [6.0, 3.4, 4.5, 1.6]];

/// Expected class for each reference row.
pub const EXPECTED_LABELS: [u32; 2] = [1, 1];

/// Reference rows with their expected labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFixture {
    features: Array2<f32>,
    expected: Array1<u32>,
}

impl Default for ReferenceFixture {
    fn default() -> Self {
        Self::iris()
    }
}

impl ReferenceFixture {
    /// The Iris fixture: both rows must be predicted as versicolor.
    pub fn iris() -> Self {
        let [a, b] = REFERENCE_ROWS;
        Self {
            features: array![[a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]]],
            expected: Array1::from(EXPECTED_LABELS.to_vec()),
        }
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn expected(&self) -> ArrayView1<'_, u32> {
        self.expected.view()
    }

    /// Exact label-sequence equality.
    pub fn matches(&self, predicted: ArrayView1<'_, u32>) -> bool {
        predicted == self.expected.view()
    }
}
