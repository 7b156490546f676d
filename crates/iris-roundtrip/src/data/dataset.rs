//! In-memory labelled dataset.
//!
//! [`Dataset`] holds a sample-major feature matrix (`[n_samples, n_features]`)
//! and one class label per sample. It is immutable once constructed; subsets
//! are produced by [`Dataset::select`] as new datasets.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

/// Errors raised while building or loading a dataset.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    /// A CSV line could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The dataset has no rows.
    #[error("dataset is empty")]
    Empty,

    /// Feature rows and labels disagree in length.
    #[error("feature matrix has {rows} rows but {labels} labels were given")]
    LabelCountMismatch { rows: usize, labels: usize },

    /// Feature name count disagrees with the number of columns.
    #[error("expected {expected} feature names, got {actual}")]
    FeatureNamesMismatch { expected: usize, actual: usize },

    /// A label references a class that does not exist.
    #[error("label {label} at row {row} is out of range for {n_classes} classes")]
    LabelOutOfRange { row: usize, label: u32, n_classes: usize },

    /// A row index passed to [`Dataset::select`] is out of bounds.
    #[error("row index {index} is out of bounds for {n_samples} samples")]
    RowOutOfBounds { index: usize, n_samples: usize },

    /// Split fraction outside `(0, 1)` or a split that leaves one side empty.
    #[error("invalid split: {0}")]
    InvalidSplit(String),
}

/// Labelled tabular dataset for multiclass classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Array1<u32>,
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset from its parts, validating shapes and label range.
    pub fn from_parts(
        features: Array2<f32>,
        labels: Array1<u32>,
        feature_names: Vec<String>,
        class_names: Vec<String>,
    ) -> Result<Self, DatasetError> {
        if features.nrows() == 0 {
            return Err(DatasetError::Empty);
        }
        if features.nrows() != labels.len() {
            return Err(DatasetError::LabelCountMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        if feature_names.len() != features.ncols() {
            return Err(DatasetError::FeatureNamesMismatch {
                expected: features.ncols(),
                actual: feature_names.len(),
            });
        }
        let n_classes = class_names.len();
        if let Some((row, &label)) = labels
            .iter()
            .enumerate()
            .find(|&(_, &l)| l as usize >= n_classes)
        {
            return Err(DatasetError::LabelOutOfRange { row, label, n_classes });
        }

        Ok(Self { features, labels, feature_names, class_names })
    }

    /// Parse a CSV table whose last column holds class names.
    ///
    /// The header row supplies feature names. Class indices are assigned in
    /// order of first appearance, so a file sorted by class yields `0, 1, 2, ...`.
    pub fn from_csv_str(text: &str) -> Result<Self, DatasetError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines.next().ok_or(DatasetError::Empty)?;
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        if columns.len() < 2 {
            return Err(DatasetError::Parse {
                line: 1,
                message: "header needs at least one feature column and a label column".into(),
            });
        }
        let n_features = columns.len() - 1;
        let feature_names: Vec<String> =
            columns[..n_features].iter().map(|s| s.to_string()).collect();

        let mut values: Vec<f32> = Vec::new();
        let mut labels: Vec<u32> = Vec::new();
        let mut class_names: Vec<String> = Vec::new();

        for (idx, line) in lines {
            let line_no = idx + 1;
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != columns.len() {
                return Err(DatasetError::Parse {
                    line: line_no,
                    message: format!("expected {} fields, got {}", columns.len(), fields.len()),
                });
            }
            for field in &fields[..n_features] {
                let value: f32 = field.parse().map_err(|_| DatasetError::Parse {
                    line: line_no,
                    message: format!("invalid feature value {field:?}"),
                })?;
                values.push(value);
            }

            let class = fields[n_features];
            let label = match class_names.iter().position(|c| c == class) {
                Some(pos) => pos,
                None => {
                    class_names.push(class.to_string());
                    class_names.len() - 1
                }
            };
            labels.push(label as u32);
        }

        let n_rows = labels.len();
        let features = Array2::from_shape_vec((n_rows, n_features), values).map_err(|e| {
            DatasetError::Parse { line: 0, message: e.to_string() }
        })?;

        Self::from_parts(features, Array1::from(labels), feature_names, class_names)
    }

    /// Replace the feature names, keeping everything else.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, DatasetError> {
        if names.len() != self.n_features() {
            return Err(DatasetError::FeatureNamesMismatch {
                expected: self.n_features(),
                actual: names.len(),
            });
        }
        self.feature_names = names;
        Ok(self)
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Number of features (columns).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of distinct classes.
    #[inline]
    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Feature matrix, shape `[n_samples, n_features]`.
    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    /// Class labels, one per sample.
    pub fn labels(&self) -> ArrayView1<'_, u32> {
        self.labels.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Sorted distinct labels present in the data.
    pub fn distinct_labels(&self) -> Vec<u32> {
        let mut seen: Vec<u32> = self.labels.to_vec();
        seen.sort_unstable();
        seen.dedup();
        seen
    }

    /// Per-feature `(min, max)` over non-missing values.
    ///
    /// A feature with only missing values reports `(NaN, NaN)`.
    pub fn feature_ranges(&self) -> Vec<(f32, f32)> {
        self.features
            .axis_iter(Axis(1))
            .map(|column| {
                column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
                        None => Some((v, v)),
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                    })
                    .unwrap_or((f32::NAN, f32::NAN))
            })
            .collect()
    }

    /// Build a new dataset from the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self, DatasetError> {
        let n_samples = self.n_samples();
        if let Some(&index) = indices.iter().find(|&&i| i >= n_samples) {
            return Err(DatasetError::RowOutOfBounds { index, n_samples });
        }
        if indices.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            class_names: self.class_names.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const SMALL: &str = "a,b,label\n1.0,2.0,x\n3.0,4.0,y\n\n5.0,6.0,x\n";

    #[test]
    fn parses_csv_with_first_seen_class_order() {
        let ds = Dataset::from_csv_str(SMALL).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.class_names(), &["x".to_string(), "y".to_string()]);
        assert_eq!(ds.labels().to_vec(), vec![0, 1, 0]);
        assert_eq!(ds.features()[[2, 1]], 6.0);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Dataset::from_csv_str("a,b,label\n1.0,x\n").unwrap_err();
        assert!(matches!(err, DatasetError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_non_numeric_features() {
        let err = Dataset::from_csv_str("a,label\nfoo,x\n").unwrap_err();
        assert!(matches!(err, DatasetError::Parse { .. }));
    }

    #[test]
    fn from_parts_validates_labels() {
        let err = Dataset::from_parts(
            array![[1.0f32], [2.0]],
            array![0u32, 3],
            vec!["f".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap_err();
        assert_eq!(err, DatasetError::LabelOutOfRange { row: 1, label: 3, n_classes: 2 });
    }

    #[test]
    fn select_keeps_order_and_rejects_out_of_bounds() {
        let ds = Dataset::from_csv_str(SMALL).unwrap();
        let sub = ds.select(&[2, 0]).unwrap();
        assert_eq!(sub.features()[[0, 0]], 5.0);
        assert_eq!(sub.labels().to_vec(), vec![0, 0]);
        assert!(matches!(ds.select(&[7]), Err(DatasetError::RowOutOfBounds { index: 7, .. })));
    }

    #[test]
    fn feature_ranges_skip_missing() {
        let ds = Dataset::from_parts(
            array![[1.0f32, f32::NAN], [-2.0, f32::NAN], [0.5, f32::NAN]],
            array![0u32, 0, 0],
            vec!["a".into(), "b".into()],
            vec!["only".into()],
        )
        .unwrap();
        let ranges = ds.feature_ranges();
        assert_eq!(ranges[0], (-2.0, 1.0));
        assert!(ranges[1].0.is_nan() && ranges[1].1.is_nan());
    }
}
