//! Datasets: the bundled Iris table and deterministic splitting.

mod dataset;
mod split;

pub use dataset::{Dataset, DatasetError};
pub use split::{split_indices, train_test_split, TrainTestSplit};

/// Raw CSV of the 150-row Iris table, sorted by class.
const IRIS_CSV: &str = include_str!("iris.csv");

/// Feature names reported for the Iris table.
pub const IRIS_FEATURE_NAMES: [&str; 4] = [
    "sepal length (cm)",
    "sepal width (cm)",
    "petal length (cm)",
    "petal width (cm)",
];

/// Fraction of rows held out for testing.
pub const TEST_FRACTION: f64 = 0.2;

/// Seed for the train/test permutation.
pub const SPLIT_SEED: u64 = 42;

/// Load the bundled Iris dataset.
///
/// 150 rows, 4 features, classes `setosa`, `versicolor`, `virginica`
/// (labels 0, 1, 2).
pub fn load_iris() -> Result<Dataset, DatasetError> {
    let names = IRIS_FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    Dataset::from_csv_str(IRIS_CSV)?.with_feature_names(names)
}

/// Load Iris and split it with the fixed fraction and seed.
pub fn load_iris_split() -> Result<TrainTestSplit, DatasetError> {
    train_test_split(&load_iris()?, TEST_FRACTION, SPLIT_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iris_shape_and_classes() {
        let iris = load_iris().unwrap();
        assert_eq!(iris.n_samples(), 150);
        assert_eq!(iris.n_features(), 4);
        assert_eq!(iris.class_names(), &["setosa", "versicolor", "virginica"]);
        assert_eq!(iris.distinct_labels(), vec![0, 1, 2]);
        assert_eq!(iris.feature_names()[2], "petal length (cm)");

        for class in 0..3u32 {
            assert_eq!(iris.labels().iter().filter(|&&l| l == class).count(), 50);
        }
    }

    #[test]
    fn iris_split_is_120_30() {
        let split = load_iris_split().unwrap();
        assert_eq!(split.train.n_samples(), 120);
        assert_eq!(split.test.n_samples(), 30);
        assert_eq!(split.train.n_classes(), 3);
    }

    #[test]
    fn iris_feature_ranges() {
        let ranges = load_iris().unwrap().feature_ranges();
        assert_eq!(ranges[0], (4.3, 7.9));
        assert_eq!(ranges[3], (0.1, 2.5));
    }
}
