//! Leaf value types for tree nodes.

/// Trait for values stored in leaf nodes.
pub trait LeafValue: Clone + Default + std::fmt::Debug + PartialEq + Send + Sync {
    /// Add this leaf's contribution to a prediction row.
    ///
    /// Scalar leaves add to `output[group]`; vector leaves add elementwise to
    /// every output.
    fn add_to(&self, output: &mut [f32], group: usize);

    /// Number of outputs carried by this leaf.
    fn width(&self) -> usize;

    /// True if every component is finite.
    fn is_finite(&self) -> bool;
}

/// Scalar leaf value (single f32), used by boosted trees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalarLeaf(pub f32);

impl LeafValue for ScalarLeaf {
    #[inline]
    fn add_to(&self, output: &mut [f32], group: usize) {
        output[group] += self.0;
    }

    #[inline]
    fn width(&self) -> usize {
        1
    }

    #[inline]
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

impl From<f32> for ScalarLeaf {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl From<ScalarLeaf> for f32 {
    fn from(leaf: ScalarLeaf) -> Self {
        leaf.0
    }
}

/// Vector leaf value, one entry per class.
///
/// Random-forest leaves store the normalized class distribution of the
/// training samples that reached them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorLeaf {
    pub values: Vec<f32>,
}

impl VectorLeaf {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Build a normalized distribution from per-class weights.
    ///
    /// All-zero weights produce a uniform distribution.
    pub fn from_class_weights(weights: &[f64]) -> Self {
        let total: f64 = weights.iter().sum();
        let values = if total > 0.0 {
            weights.iter().map(|&w| (w / total) as f32).collect()
        } else {
            vec![1.0 / weights.len().max(1) as f32; weights.len()]
        };
        Self { values }
    }
}

impl LeafValue for VectorLeaf {
    fn add_to(&self, output: &mut [f32], _group: usize) {
        for (out, v) in output.iter_mut().zip(&self.values) {
            *out += *v;
        }
    }

    #[inline]
    fn width(&self) -> usize {
        self.values.len()
    }

    fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
