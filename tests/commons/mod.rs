#![allow(dead_code)]

use faer::Mat;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Create a synthetic dataset of isotropic Gaussian clusters
///
/// Cluster `c` is centred at `separation * c` in every feature, with unit
/// standard deviation around the centre.
///
/// ### Returns
///
/// Tuple of `(data, labels)`, rows ordered by cluster
pub fn create_cluster_data(
    n_per_cluster: usize,
    n_clusters: usize,
    n_dim: usize,
    separation: f64,
    seed: u64,
) -> (Mat<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let n_total = n_per_cluster * n_clusters;

    let mut data_vec = Vec::with_capacity(n_total * n_dim);
    let mut labels = Vec::with_capacity(n_total);

    for cluster_id in 0..n_clusters {
        let centre = separation * cluster_id as f64;
        for _ in 0..n_per_cluster {
            for _ in 0..n_dim {
                data_vec.push(centre + noise.sample(&mut rng));
            }
            labels.push(cluster_id);
        }
    }

    let data = Mat::from_fn(n_total, n_dim, |i, j| data_vec[i * n_dim + j]);
    (data, labels)
}

/// Mean pairwise embedding distance within and between clusters
///
/// ### Returns
///
/// Tuple of `(intra, inter)`
pub fn intra_inter_distances(coords: &[Vec<f64>], labels: &[usize]) -> (f64, f64) {
    let n = labels.len();
    let (mut intra, mut n_intra) = (0.0, 0usize);
    let (mut inter, mut n_inter) = (0.0, 0usize);

    for i in 0..n {
        for j in (i + 1)..n {
            let d = coords
                .iter()
                .map(|dim| (dim[i] - dim[j]).powi(2))
                .sum::<f64>()
                .sqrt();
            if labels[i] == labels[j] {
                intra += d;
                n_intra += 1;
            } else {
                inter += d;
                n_inter += 1;
            }
        }
    }

    (intra / n_intra as f64, inter / n_inter as f64)
}
