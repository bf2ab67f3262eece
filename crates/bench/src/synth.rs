//! Synthetic clustered datasets.
//!
//! Cluster centers are rejection-sampled uniformly in [-10, 10]^dim until
//! pairwise Euclidean separation holds; samples add per-coordinate Gaussian
//! noise around a center.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use smallworld_core::distance::l2;

/// Draws `clusters` centers whose pairwise Euclidean distance is at least
/// `min_dist`. With min_dist well under the cell diagonal this terminates
/// quickly; pathological parameters (many clusters, tiny cube) will spin.
pub fn well_separated_centers<R: Rng>(
    dim: usize,
    clusters: usize,
    min_dist: f32,
    rng: &mut R,
) -> Vec<Vec<f32>> {
    let mut centers: Vec<Vec<f32>> = Vec::with_capacity(clusters);
    while centers.len() < clusters {
        let candidate: Vec<f32> = (0..dim).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let too_close = centers
            .iter()
            .any(|center| l2(&candidate, center).sqrt() < min_dist);
        if !too_close {
            centers.push(candidate);
        }
    }
    centers
}

/// One sample: `center` plus N(0, sigma) noise on every coordinate.
pub fn sample_near<R: Rng>(center: &[f32], sigma: f32, rng: &mut R) -> Vec<f32> {
    let noise = Normal::new(0.0f32, sigma).expect("sigma must be finite and non-negative");
    center.iter().map(|&x| x + noise.sample(rng)).collect()
}

/// Cluster-major dataset: `pts` samples around each center, in center order.
/// Returns the vectors together with their cluster labels.
pub fn clustered_dataset<R: Rng>(
    centers: &[Vec<f32>],
    pts: usize,
    sigma: f32,
    rng: &mut R,
) -> (Vec<Vec<f32>>, Vec<usize>) {
    let mut dataset = Vec::with_capacity(centers.len() * pts);
    let mut labels = Vec::with_capacity(centers.len() * pts);
    for (cluster, center) in centers.iter().enumerate() {
        for _ in 0..pts {
            dataset.push(sample_near(center, sigma, rng));
            labels.push(cluster);
        }
    }
    (dataset, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_centers_respect_separation() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let centers = well_separated_centers(16, 5, 8.0, &mut rng);
        assert_eq!(centers.len(), 5);
        for i in 0..centers.len() {
            assert_eq!(centers[i].len(), 16);
            for j in (i + 1)..centers.len() {
                let dist = l2(&centers[i], &centers[j]).sqrt();
                assert!(dist >= 8.0, "centers {i} and {j} only {dist} apart");
            }
        }
    }

    #[test]
    fn test_samples_stay_near_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let center = vec![2.0f32; 8];
        for _ in 0..50 {
            let sample = sample_near(&center, 0.01, &mut rng);
            assert_eq!(sample.len(), 8);
            assert!(l2(&sample, &center).sqrt() < 1.0);
        }
    }

    #[test]
    fn test_dataset_shape_and_labels() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let centers = well_separated_centers(4, 3, 5.0, &mut rng);
        let (dataset, labels) = clustered_dataset(&centers, 10, 0.1, &mut rng);
        assert_eq!(dataset.len(), 30);
        assert_eq!(labels.len(), 30);
        assert_eq!(labels[0], 0);
        assert_eq!(labels[29], 2);
    }
}
