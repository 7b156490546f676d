//! Row and column subsampling.
//!
//! Both samplers draw from one seeded `StdRng` owned by the trainer, so a
//! fixed seed reproduces the same subsets.

use rand::Rng;
use rand::seq::SliceRandom;

/// Row subsampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RowSamplingParams {
    /// Use every row.
    #[default]
    None,
    /// Sample this fraction of rows without replacement, per tree.
    Uniform { fraction: f32 },
}

/// Column subsampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ColSamplingParams {
    /// Use every feature.
    #[default]
    None,
    /// Sample this fraction of features, per tree.
    PerTree { fraction: f32 },
}

/// Sorted row subset for one tree, or `None` for all rows.
pub fn sample_rows<R: Rng>(
    params: RowSamplingParams,
    n_rows: usize,
    rng: &mut R,
) -> Option<Vec<u32>> {
    match params {
        RowSamplingParams::Uniform { fraction } if fraction < 1.0 => {
            let k = ((n_rows as f64 * fraction as f64).ceil() as usize).clamp(1, n_rows);
            let mut rows: Vec<u32> = (0..n_rows as u32).collect();
            rows.shuffle(rng);
            rows.truncate(k);
            rows.sort_unstable();
            Some(rows)
        }
        _ => None,
    }
}

/// Sorted feature subset for one tree.
pub fn sample_features<R: Rng>(
    params: ColSamplingParams,
    n_features: usize,
    rng: &mut R,
) -> Vec<u32> {
    match params {
        ColSamplingParams::PerTree { fraction } if fraction < 1.0 => {
            let k = ((n_features as f64 * fraction as f64).round() as usize).clamp(1, n_features);
            let mut features: Vec<u32> = (0..n_features as u32).collect();
            features.shuffle(rng);
            features.truncate(k);
            features.sort_unstable();
            features
        }
        _ => (0..n_features as u32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn no_sampling_keeps_everything() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sample_rows(RowSamplingParams::None, 10, &mut rng), None);
        assert_eq!(sample_features(ColSamplingParams::None, 3, &mut rng), vec![0, 1, 2]);
    }

    #[test]
    fn uniform_rows_are_sorted_subset() {
        let mut rng = StdRng::seed_from_u64(1);
        let rows = sample_rows(RowSamplingParams::Uniform { fraction: 0.5 }, 10, &mut rng).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn feature_sampling_keeps_at_least_one() {
        let mut rng = StdRng::seed_from_u64(2);
        let f = sample_features(ColSamplingParams::PerTree { fraction: 0.01 }, 4, &mut rng);
        assert_eq!(f.len(), 1);
    }
}
