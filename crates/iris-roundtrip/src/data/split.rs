//! Deterministic train/test splitting.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{Dataset, DatasetError};

/// A dataset split into disjoint train and test parts.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
}

/// Shuffle `0..n_rows` with a seeded RNG and cut off the test part.
///
/// The test set receives `ceil(test_fraction * n_rows)` indices taken from the
/// front of the permutation; the remainder forms the train set. Returns
/// `(train, test)`.
pub fn split_indices(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), DatasetError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DatasetError::InvalidSplit(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = (n_rows as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(DatasetError::InvalidSplit(format!(
            "{n_rows} rows cannot be split with test fraction {test_fraction}"
        )));
    }

    let mut idx: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let (test, train) = idx.split_at(n_test);
    Ok((train.to_vec(), test.to_vec()))
}

/// Split a dataset into train and test subsets.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, DatasetError> {
    let (train_idx, test_idx) = split_indices(dataset.n_samples(), test_fraction, seed)?;
    Ok(TrainTestSplit {
        train: dataset.select(&train_idx)?,
        test: dataset.select(&test_idx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_use_ceiling() {
        let (train, test) = split_indices(150, 0.2, 42).unwrap();
        assert_eq!(test.len(), 30);
        assert_eq!(train.len(), 120);

        let (train, test) = split_indices(11, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn decimal_fractions_do_not_round_up() {
        // 0.2 is not exact in binary; 150 * 0.2 must still give 30 test rows.
        let cases = [(150, 0.2, 30), (100, 0.3, 30), (50, 0.1, 5), (10, 0.7, 7)];
        for (n_rows, fraction, n_test) in cases {
            let (train, test) = split_indices(n_rows, fraction, 42).unwrap();
            assert_eq!(test.len(), n_test, "{n_rows} rows at {fraction}");
            assert_eq!(train.len(), n_rows - n_test);
        }
    }

    #[test]
    fn split_is_a_partition() {
        let (train, test) = split_indices(150, 0.2, 7).unwrap();
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..150).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_deterministic_per_seed() {
        assert_eq!(split_indices(150, 0.2, 42).unwrap(), split_indices(150, 0.2, 42).unwrap());
        assert_ne!(split_indices(150, 0.2, 42).unwrap(), split_indices(150, 0.2, 43).unwrap());
    }

    #[test]
    fn rejects_degenerate_fractions() {
        assert!(split_indices(10, 0.0, 1).is_err());
        assert!(split_indices(10, 1.0, 1).is_err());
        assert!(split_indices(1, 0.5, 1).is_err());
    }
}
